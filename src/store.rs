//! # 文件存储层
//!
//! 路由与处理函数只依赖 `FileStore` 的四个操作：存储、读取、删除、判断存在。
//! `DiskStore` 是基于本地目录的实现，布局如下：
//!
//! ```text
//! <storage_root>/<bucket>/<key>          对象内容
//! <storage_root>/<bucket>/.meta/<key>    对象的 Content-Type
//! ```
//!
//! 读取路径带有一个 LRU 缓存，以文件修改时间判定缓存是否仍然有效。

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info, warn};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tokio::fs;

use crate::{
    cache::ObjectCache,
    exception::Exception,
    param::{MIME_TYPES, OCTET_STREAM},
    util::format_file_size,
};

const META_DIR: &str = ".meta";

/// URL 中的对象键只保留 RFC 3986 的非保留字符
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// 从存储中读取出的对象
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub content_type: String,
    pub data: Bytes,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileStore: Send + Sync {
    /// 以 `name` 为键保存对象，返回可访问的 URL
    async fn store(&self, name: &str, content_type: &str, data: Bytes) -> Result<String, Exception>;

    async fn fetch(&self, key: &str) -> Result<StoredFile, Exception>;

    async fn delete(&self, key: &str) -> Result<(), Exception>;

    async fn exists(&self, key: &str) -> Result<bool, Exception>;
}

/// 对象键只能是单个路径段，且不能以 `.` 开头（避免覆盖元数据目录或越出存储目录）
pub fn validate_key(key: &str) -> Result<(), Exception> {
    let invalid = key.is_empty()
        || key.starts_with('.')
        || key.contains(|c: char| c == '/' || c == '\\' || c == '\0');
    if invalid {
        return Err(Exception::InvalidKey(key.to_string()));
    }
    Ok(())
}

pub struct DiskStore {
    dir: PathBuf,
    public_url: String,
    cache: Mutex<ObjectCache>,
    cache_threshold: u64,
}

impl DiskStore {
    pub fn new(
        storage_root: &str,
        bucket: &str,
        public_url: &str,
        cache_size: usize,
        cache_threshold: u64,
    ) -> Self {
        Self {
            dir: Path::new(storage_root).join(bucket),
            public_url: public_url.trim_end_matches('/').to_string(),
            cache: Mutex::new(ObjectCache::from_capacity(cache_size)),
            cache_threshold,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.dir.join(META_DIR).join(key)
    }

    fn url_for(&self, key: &str) -> String {
        format!(
            "{}/files/{}",
            self.public_url,
            utf8_percent_encode(key, KEY_ENCODE_SET)
        )
    }

    fn with_cache<T>(&self, f: impl FnOnce(&mut ObjectCache) -> T) -> T {
        let mut lock = match self.cache.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("缓存锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        };
        f(&mut lock)
    }

    async fn read_content_type(&self, key: &str) -> Result<String, Exception> {
        match fs::read_to_string(self.meta_path(key)).await {
            Ok(content_type) => Ok(content_type.trim().to_string()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let guessed = Path::new(key)
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .and_then(|ext| MIME_TYPES.get(ext.to_lowercase().as_str()).copied())
                    .unwrap_or(OCTET_STREAM);
                Ok(guessed.to_string())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl FileStore for DiskStore {
    async fn store(
        &self,
        name: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<String, Exception> {
        validate_key(name)?;
        fs::create_dir_all(self.dir.join(META_DIR)).await?;

        let size = data.len() as u64;
        fs::write(self.object_path(name), &data).await?;
        fs::write(self.meta_path(name), content_type.as_bytes()).await?;
        self.with_cache(|cache| cache.invalidate(name));

        let url = self.url_for(name);
        info!("文件上传成功: {} ({})", url, format_file_size(size));
        Ok(url)
    }

    async fn fetch(&self, key: &str) -> Result<StoredFile, Exception> {
        validate_key(key)?;
        let path = self.object_path(key);
        let metadata = match fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Exception::FileNotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let modified_time = metadata.modified()?;

        if let Some(file) = self.with_cache(|cache| cache.find(key, modified_time)) {
            debug!("缓存命中: {}", key);
            return Ok(file);
        }

        let data = Bytes::from(fs::read(&path).await?);
        let content_type = self.read_content_type(key).await?;
        let file = StoredFile { content_type, data };

        if ObjectCache::should_cache(metadata.len(), self.cache_threshold) {
            self.with_cache(|cache| cache.push(key, file.clone(), modified_time));
            debug!("对象已加入缓存: {}", key);
        } else {
            debug!("对象过大({} bytes)，跳过缓存: {}", metadata.len(), key);
        }
        Ok(file)
    }

    async fn delete(&self, key: &str) -> Result<(), Exception> {
        validate_key(key)?;
        match fs::remove_file(self.object_path(key)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Exception::FileNotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        }
        match fs::remove_file(self.meta_path(key)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.with_cache(|cache| cache.invalidate(key));
        info!("文件删除成功: {}", key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, Exception> {
        validate_key(key)?;
        match fs::metadata(self.object_path(key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
