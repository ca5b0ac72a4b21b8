use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::env;
use std::fs::File;
use std::io::prelude::*;

use crate::exception::Exception;
use crate::param::DEFAULT_ALLOWED_CONTENT_TYPES;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    host: String,
    port: u16,
    worker_threads: usize,
    storage_root: String,
    bucket: String,
    #[serde(default = "default_public_url")]
    public_url: String,
    #[serde(default = "default_cache_size")]
    cache_size: usize,
    #[serde(default = "default_cache_threshold")]
    cache_threshold: u64,
    #[serde(default = "default_max_body_size")]
    max_body_size: u64,
    #[serde(default = "default_allowed_content_types")]
    allowed_content_types: Vec<String>,
    #[serde(default = "default_compression")]
    compression: bool,
}

fn default_public_url() -> String {
    "".to_string()
}

fn default_cache_size() -> usize {
    64
}

fn default_cache_threshold() -> u64 {
    1048576 // 1MB
}

fn default_max_body_size() -> u64 {
    52428800 // 50MB
}

fn default_allowed_content_types() -> Vec<String> {
    DEFAULT_ALLOWED_CONTENT_TYPES.clone()
}

fn default_compression() -> bool {
    true
}

impl Config {
    pub fn new() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3000,
            worker_threads: 0,
            storage_root: "data".to_string(),
            bucket: "uploads".to_string(),
            public_url: default_public_url(),
            cache_size: default_cache_size(),
            cache_threshold: default_cache_threshold(),
            max_body_size: default_max_body_size(),
            allowed_content_types: default_allowed_content_types(),
            compression: default_compression(),
        }
        .normalized()
    }

    /// 从 TOML 文件读取配置。文件不存在时使用默认配置，格式错误时返回异常。
    pub fn from_toml(filename: &str) -> Result<Self, Exception> {
        let mut file = match File::open(filename) {
            Ok(f) => f,
            Err(e) => {
                warn!("无法打开配置文件{}：{}，使用默认配置", filename, e);
                return Ok(Config::new());
            }
        };
        let mut str_val = String::new();
        if let Err(e) = file.read_to_string(&mut str_val) {
            error!("读取配置文件{}失败: {}", filename, e);
            return Err(Exception::Config(e.to_string()));
        }
        Self::parse_toml(&str_val)
    }

    pub fn parse_toml(content: &str) -> Result<Self, Exception> {
        match toml::from_str::<Config>(content) {
            Ok(config) => Ok(config.normalized()),
            Err(e) => {
                error!("无法成功从配置文件构建配置对象: {}", e);
                Err(Exception::Config(e.to_string()))
            }
        }
    }

    fn normalized(mut self) -> Self {
        if self.worker_threads == 0 {
            self.worker_threads = num_cpus::get();
        }
        if self.cache_size == 0 {
            warn!("cache_size被设置为0，但目前尚不支持禁用缓存，因此该值将被改为5。");
            self.cache_size = 5;
        }
        if self.public_url.is_empty() {
            self.public_url = format!("http://{}:{}", self.host, self.port);
        }
        self
    }

    /// 用环境变量覆盖配置：`HOST`, `PORT`, `STORAGE_ROOT`, `BUCKET_NAME`, `PUBLIC_URL`
    pub fn apply_env(self) -> Result<Self, Exception> {
        self.apply_overrides(|name| env::var(name).ok())
    }

    fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, Exception>
    where
        F: Fn(&str) -> Option<String>,
    {
        let derived_url = format!("http://{}:{}", self.host, self.port);
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = port.trim().parse().map_err(|_| {
                Exception::Config(format!("PORT must be a port number, got '{}'", port))
            })?;
        }
        if let Some(root) = lookup("STORAGE_ROOT") {
            self.storage_root = root;
        }
        if let Some(bucket) = lookup("BUCKET_NAME") {
            self.bucket = bucket;
        }
        match lookup("PUBLIC_URL") {
            Some(url) => self.public_url = url,
            // 地址由 host/port 推导而来时，跟随覆盖后的值
            None if self.public_url == derived_url => {
                self.public_url = format!("http://{}:{}", self.host, self.port);
            }
            None => {}
        }
        Ok(self)
    }

    /// 校验配置，把所有不合法的字段汇总到一条错误信息中
    pub fn validate(self) -> Result<Self, Exception> {
        let mut errors = Vec::new();
        if self.host.trim().is_empty() {
            errors.push("host should not be empty");
        }
        if self.port == 0 {
            errors.push("port must be a positive integer");
        }
        if self.storage_root.trim().is_empty() {
            errors.push("storage_root should not be empty");
        }
        if self.bucket.trim().is_empty() {
            errors.push("bucket should not be empty");
        }
        if self.bucket.contains('/') || self.bucket.contains('\\') || self.bucket == ".." {
            errors.push("bucket must be a single directory name");
        }
        if self.max_body_size == 0 {
            errors.push("max_body_size must be a positive integer");
        }
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(Exception::Config(errors.join("; ")))
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn storage_root(&self) -> &str {
        &self.storage_root
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn cache_threshold(&self) -> u64 {
        self.cache_threshold
    }

    pub fn max_body_size(&self) -> u64 {
        self.max_body_size
    }

    pub fn allowed_content_types(&self) -> &[String] {
        &self.allowed_content_types
    }

    pub fn compression(&self) -> bool {
        self.compression
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
        host = "0.0.0.0"
        port = 8080
        worker_threads = 2
        storage_root = "/var/lib/filegate"
        bucket = "media"
    "#;

    #[test]
    fn test_parse_applies_defaults() {
        let config = Config::parse_toml(SAMPLE).unwrap();
        assert_eq!(config.port(), 8080);
        assert_eq!(config.worker_threads(), 2);
        assert_eq!(config.public_url(), "http://0.0.0.0:8080");
        assert_eq!(config.max_body_size(), 52428800);
        assert_eq!(config.allowed_content_types().len(), 3);
        assert!(config.compression());
    }

    #[test]
    fn test_zero_values_are_normalized() {
        let content = format!(
            "{}\ncache_size = 0",
            SAMPLE.replace("worker_threads = 2", "worker_threads = 0")
        );
        let config = Config::parse_toml(&content).unwrap();
        assert_eq!(config.cache_size(), 5);
        assert!(config.worker_threads() > 0);
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = Config::from_toml(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.bucket(), "media");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::from_toml("/nonexistent/filegate.toml").unwrap();
        assert_eq!(config.port(), 3000);
        assert_eq!(config.public_url(), "http://localhost:3000");
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::parse_toml("port = \"not a number\"");
        assert!(matches!(result, Err(Exception::Config(_))));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> =
            [("PORT", "9000"), ("BUCKET_NAME", "docs")].into_iter().collect();
        let config = Config::parse_toml(SAMPLE)
            .unwrap()
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.port(), 9000);
        assert_eq!(config.bucket(), "docs");
        assert_eq!(config.public_url(), "http://0.0.0.0:9000");
    }

    #[test]
    fn test_invalid_port_override() {
        let result = Config::new().apply_overrides(|name| {
            if name == "PORT" {
                Some("abc".to_string())
            } else {
                None
            }
        });
        assert!(matches!(result, Err(Exception::Config(_))));
    }

    #[test]
    fn test_validate_collects_errors() {
        let content = SAMPLE
            .replace("port = 8080", "port = 0")
            .replace("bucket = \"media\"", "bucket = \"\"");
        let err = Config::parse_toml(&content).unwrap().validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("port must be a positive integer"));
        assert!(message.contains("bucket should not be empty"));
    }

    #[test]
    fn test_validate_ok() {
        assert!(Config::new().validate().is_ok());
    }
}
