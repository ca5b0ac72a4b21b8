//! # 文件接口
//!
//! `FileService` 封装对存储层的业务规则（读取、替换、删除之前先确认对象存在），
//! `FileController` 把它们适配为路由处理函数。
//!
//! 处理函数中的错误通过 `?` 向上传递，由服务端统一转换为 `500 {"error": ...}`。

use std::sync::Arc;

use log::{debug, info};
use serde_json::json;

use crate::{
    context::RequestContext,
    exception::Exception,
    multipart::FilePart,
    response::Response,
    store::{FileStore, StoredFile},
};

pub struct FileService {
    store: Arc<dyn FileStore>,
}

impl FileService {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self { store }
    }

    /// 按顺序逐个保存，返回与输入顺序一致的 URL 列表
    pub async fn upload(&self, files: Vec<FilePart>) -> Result<Vec<String>, Exception> {
        let mut urls = Vec::with_capacity(files.len());
        for file in files {
            let url = self
                .store
                .store(&file.name, &file.content_type, file.data)
                .await?;
            urls.push(url);
        }
        Ok(urls)
    }

    pub async fn retrieve(&self, key: &str) -> Result<StoredFile, Exception> {
        self.ensure_exists(key).await?;
        self.store.fetch(key).await
    }

    /// 删除旧对象，再以上传文件自己的文件名保存新内容，返回新对象的 URL
    pub async fn replace(&self, key: &str, file: FilePart) -> Result<String, Exception> {
        self.ensure_exists(key).await?;
        self.store.delete(key).await?;
        self.store
            .store(&file.name, &file.content_type, file.data)
            .await
    }

    pub async fn delete(&self, key: &str) -> Result<(), Exception> {
        self.ensure_exists(key).await?;
        self.store.delete(key).await
    }

    async fn ensure_exists(&self, key: &str) -> Result<(), Exception> {
        if self.store.exists(key).await? {
            Ok(())
        } else {
            Err(Exception::FileNotFound(key.to_string()))
        }
    }
}

pub struct FileController {
    service: FileService,
}

/// 取出路由参数 `key`，缺失时给出 400 响应
fn key_param(ctx: &RequestContext) -> Result<String, Response> {
    match ctx.param("key") {
        Some(key) if !key.is_empty() => Ok(key.to_string()),
        _ => Err(Response::error(400, "Missing key parameter")),
    }
}

impl FileController {
    pub fn new(service: FileService) -> Self {
        Self { service }
    }

    pub async fn upload(&self, mut ctx: RequestContext) -> Result<Response, Exception> {
        let id = ctx.id();
        let files = ctx.take_files();
        debug!("[ID{}]上传{}个文件", id, files.len());
        let urls = self.service.upload(files).await?;
        info!("[ID{}]上传完成：{:?}", id, urls);
        Ok(Response::json(200, &json!({ "urls": urls })))
    }

    pub async fn replace(&self, mut ctx: RequestContext) -> Result<Response, Exception> {
        let key = match key_param(&ctx) {
            Ok(key) => key,
            Err(response) => return Ok(response),
        };
        let file = match ctx.take_files().into_iter().next() {
            Some(file) => file,
            None => {
                return Ok(Response::error(400, "No file provided for replacement"));
            }
        };
        let url = self.service.replace(&key, file).await?;
        info!("[ID{}]文件 {} 已被替换", ctx.id(), key);
        Ok(Response::json(
            200,
            &json!({ "message": "File replaced successfully", "url": url }),
        ))
    }

    pub async fn retrieve(&self, ctx: RequestContext) -> Result<Response, Exception> {
        let key = match key_param(&ctx) {
            Ok(key) => key,
            Err(response) => return Ok(response),
        };
        let file = self.service.retrieve(&key).await?;
        debug!("[ID{}]返回文件 {}，{}字节", ctx.id(), key, file.data.len());
        Ok(Response::bytes(200, &file.content_type, file.data))
    }

    pub async fn delete(&self, ctx: RequestContext) -> Result<Response, Exception> {
        let key = match key_param(&ctx) {
            Ok(key) => key,
            Err(response) => return Ok(response),
        };
        self.service.delete(&key).await?;
        info!("[ID{}]文件 {} 已删除", ctx.id(), key);
        Ok(Response::json(
            200,
            &json!({ "message": "File deleted successfully" }),
        ))
    }
}
