//! # 内置中间件
//!
//! - `MultipartMiddleware`：校验 `Content-Type`，边接收边缓冲请求体，并把解析出的文件放进上下文；
//! - `ContentTypeValidator`：拒绝没有文件或包含不允许类型的上传；
//! - `AccessLog`：全局中间件，记录进入管道的请求。

use async_trait::async_trait;
use log::{debug, error};

use crate::{
    context::RequestContext,
    exception::Exception,
    multipart::MultipartParser,
    pipeline::{Flow, Middleware},
    response::Response,
    util::format_file_size,
};

/// 解析 multipart/form-data 请求体
pub struct MultipartMiddleware {
    max_body_size: u64,
}

impl MultipartMiddleware {
    pub fn new(max_body_size: u64) -> Self {
        Self { max_body_size }
    }
}

#[async_trait]
impl Middleware for MultipartMiddleware {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<Flow, Exception> {
        let id = ctx.id();
        let content_type = ctx.request().content_type().unwrap_or("").to_string();

        // 在读取任何请求体之前完成 Content-Type 校验
        if !MultipartParser::is_multipart(&content_type) {
            debug!("[ID{}]非 multipart 请求：{}", id, content_type);
            return Ok(Flow::Respond(Response::error(400, "Invalid Content-Type")));
        }
        let boundary = match MultipartParser::get_boundary(&content_type) {
            Some(b) => b,
            None => {
                debug!("[ID{}]Content-Type 中缺少 boundary", id);
                return Ok(Flow::Respond(Response::error(
                    400,
                    "No boundary found in Content-Type header",
                )));
            }
        };

        let body = ctx.body_mut();
        if body.content_length() > self.max_body_size {
            debug!(
                "[ID{}]请求体过大：{}，上限：{}",
                id,
                format_file_size(body.content_length()),
                format_file_size(self.max_body_size)
            );
            return Ok(Flow::Respond(Response::error(413, "Payload too large")));
        }

        let mut parser = MultipartParser::new(&boundary);
        loop {
            match body.chunk().await {
                Ok(Some(chunk)) => parser.append_data(&chunk),
                Ok(None) => break,
                Err(e) => {
                    error!("[ID{}]读取请求体失败: {}", id, e);
                    return Err(Exception::BodyRead(e.to_string()));
                }
            }
        }
        debug!("[ID{}]请求体接收完毕，共{}字节", id, parser.buffered_len());

        let files = parser.parse();
        debug!("[ID{}]解析出{}个分段", id, files.len());
        ctx.set_files(files);
        Ok(Flow::Next)
    }
}

/// 只允许配置中列出的文件类型通过
pub struct ContentTypeValidator {
    allowed: Vec<String>,
}

impl ContentTypeValidator {
    pub fn new(allowed: &[String]) -> Self {
        Self {
            allowed: allowed.iter().map(|t| essence(t)).collect(),
        }
    }

    fn is_allowed(&self, content_type: &str) -> bool {
        let content_type = essence(content_type);
        self.allowed.iter().any(|t| *t == content_type)
    }
}

/// 去掉 MIME 参数部分并统一为小写，`image/PNG; q=1` -> `image/png`
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

#[async_trait]
impl Middleware for ContentTypeValidator {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<Flow, Exception> {
        let files = match ctx.files() {
            Some(files) if !files.is_empty() => files,
            _ => return Ok(Flow::Respond(Response::error(400, "No files found."))),
        };
        if let Some(invalid) = files.iter().find(|f| !self.is_allowed(&f.content_type)) {
            debug!(
                "[ID{}]拒绝文件 {}，类型 {} 不在允许列表中",
                ctx.id(),
                invalid.name,
                invalid.content_type
            );
            return Ok(Flow::Respond(Response::error(
                400,
                "Invalid file type(s) uploaded.",
            )));
        }
        Ok(Flow::Next)
    }
}

/// 记录每个进入管道的请求
pub struct AccessLog;

#[async_trait]
impl Middleware for AccessLog {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<Flow, Exception> {
        debug!(
            "[ID{}]{} {} 参数：{:?} UA：{}",
            ctx.id(),
            ctx.request().method(),
            ctx.path(),
            ctx.params(),
            ctx.request().user_agent()
        );
        Ok(Flow::Next)
    }
}
