// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 该模块负责将 TCP 流中读取的请求头字节解析为强类型的 `Request` 结构体，
//! 并提供按 `Content-Length` 限定长度、逐块读取的请求体 `Body`。它涵盖了：
//! 1. 请求行（Request-Line）的解析（方法、路径、版本）。
//! 2. 常用 HTTP 标头（Headers）的提取，头部名大小写不敏感。
//! 3. 内容协商（Content Negotiation）相关的编码解析。
//! 4. 请求体的增量读取，供 multipart 中间件边接收边缓冲。

use std::{fmt, io};

use bytes::Bytes;
use log::error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{exception::Exception, param::*, util::strip_query};

/// 单次从连接读取请求体的最大字节数
const BODY_CHUNK_SIZE: usize = 8192;

/// 表示一个 HTTP 请求的头部元数据。
///
/// 请求体不在这里，而是由 `Body` 单独承载，以便按需流式读取。
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP 请求方法
    method: HttpRequestMethod,
    /// 请求目标（包含查询字符串，未解码）
    target: String,
    /// HTTP 协议版本
    version: HttpVersion,
    /// 按出现顺序保存的全部标头
    headers: Vec<(String, String)>,
    /// 客户端标识字符串
    user_agent: String,
    /// 客户端支持的压缩编码列表（按解析顺序排列）
    accept_encoding: Vec<HttpEncoding>,
    /// 声明的请求体长度
    content_length: Option<u64>,
}

impl Request {
    /// 从请求头字节（不含结尾的空行）尝试构建 `Request` 实例。
    ///
    /// # 逻辑步骤
    /// 1. 验证编码：确保请求头是合法的 UTF-8 字符串。
    /// 2. 解析请求行：提取方法、路径和协议版本。未知方法不在此处拒绝。
    /// 3. 迭代解析标头，识别 `User-Agent`, `Accept-Encoding`, `Content-Length` 等字段。
    ///
    /// # 参数
    /// * `buffer` - 从网络 Socket 读取的请求头数据。
    /// * `id` - 全局请求 ID，用于在多线程环境下追踪日志。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        // 1. 将字节流转换为字符串，失败则判定为非法的 HTTP 请求
        let request_string = match std::str::from_utf8(buffer) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut request_lines = request_string.split(CRLF);

        // 2. 解析请求行 (e.g., "PUT /files/a.png HTTP/1.1")
        let first_line = request_lines.next().unwrap_or("");
        let first_line_parts: Vec<&str> = first_line.split(' ').collect();
        if first_line_parts.len() != 3 || first_line_parts.iter().any(|p| p.is_empty()) {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, first_line);
            return Err(Exception::MalformedRequestLine);
        }

        let method = HttpRequestMethod::parse(first_line_parts[0]);
        let target = first_line_parts[1].to_string();

        let version_str = first_line_parts[2].to_uppercase();
        let version = match version_str.as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            "HTTP/1.0" => HttpVersion::V1_0,
            _ => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, &version_str);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        // 3. 迭代各行解析 Headers
        let mut headers = Vec::new();
        let mut user_agent = "".to_string();
        let mut accept_encoding = vec![];
        let mut content_length = None;
        for line in request_lines {
            if line.is_empty() {
                break;
            }
            let (name, value) = match line.split_once(':') {
                Some((name, value)) => (name.trim(), value.trim()),
                None => continue,
            };
            if name.eq_ignore_ascii_case("user-agent") {
                user_agent = value.to_string();
            } else if name.eq_ignore_ascii_case("content-length") {
                match value.parse::<u64>() {
                    Ok(len) => content_length = Some(len),
                    Err(_) => {
                        error!("[ID{}]非法的Content-Length：{}", id, value);
                        return Err(Exception::InvalidContentLength);
                    }
                }
            } else if name.eq_ignore_ascii_case("accept-encoding") {
                // 只要包含关键词即视为支持
                if value.contains("gzip") {
                    accept_encoding.push(HttpEncoding::Gzip);
                }
                if value.contains("deflate") {
                    accept_encoding.push(HttpEncoding::Deflate);
                }
                if value.contains("br") {
                    accept_encoding.push(HttpEncoding::Br);
                }
            }
            headers.push((name.to_string(), value.to_string()));
        }

        Ok(Self {
            method,
            target,
            version,
            headers,
            user_agent,
            accept_encoding,
            content_length,
        })
    }
}

// --- Getter 访问器实现 ---

impl Request {
    /// 获取 HTTP 协议版本
    pub fn version(&self) -> &HttpVersion {
        &self.version
    }

    /// 获取完整的请求目标（含查询参数，未解码）
    pub fn target(&self) -> &str {
        &self.target
    }

    /// 获取去掉查询参数后的路径（未解码）
    pub fn path(&self) -> &str {
        strip_query(&self.target)
    }

    /// 获取请求方法
    pub fn method(&self) -> &HttpRequestMethod {
        &self.method
    }

    /// 获取用户代理字符串
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// 获取客户端支持的压缩算法列表
    pub fn accept_encoding(&self) -> &Vec<HttpEncoding> {
        &self.accept_encoding
    }

    /// 获取声明的请求体长度
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// 获取 `Content-Type` 标头
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// 按名称（大小写不敏感）查找第一个匹配的标头
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// 长度受 `Content-Length` 约束的请求体。
///
/// 读取请求头时可能已经多读了一部分请求体，这部分保存在 `buffered` 中，会最先被返回。
pub struct Body {
    buffered: Bytes,
    source: Option<Box<dyn AsyncRead + Send + Unpin>>,
    remaining: u64,
    declared: u64,
}

impl Body {
    /// 没有请求体
    pub fn empty() -> Self {
        Self {
            buffered: Bytes::new(),
            source: None,
            remaining: 0,
            declared: 0,
        }
    }

    /// 已完整位于内存中的请求体
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let buffered = bytes.into();
        let declared = buffered.len() as u64;
        Self {
            buffered,
            source: None,
            remaining: 0,
            declared,
        }
    }

    /// 由已读到的前缀和连接的剩余部分组成的请求体
    pub fn from_stream<R>(prefix: Bytes, source: R, content_length: u64) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let mut buffered = prefix;
        if buffered.len() as u64 > content_length {
            buffered.truncate(content_length as usize);
        }
        let remaining = content_length - buffered.len() as u64;
        Self {
            buffered,
            source: Some(Box::new(source)),
            remaining,
            declared: content_length,
        }
    }

    /// 请求声明的请求体长度
    pub fn content_length(&self) -> u64 {
        self.declared
    }

    /// 读取下一块数据，读完时返回 `Ok(None)`。
    ///
    /// 连接在请求体读完之前关闭会返回 `UnexpectedEof`。
    pub async fn chunk(&mut self) -> io::Result<Option<Bytes>> {
        if !self.buffered.is_empty() {
            return Ok(Some(std::mem::take(&mut self.buffered)));
        }
        if self.remaining == 0 {
            return Ok(None);
        }
        let source = match self.source.as_mut() {
            Some(source) => source,
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "request body source is missing",
                ))
            }
        };
        let size = BODY_CHUNK_SIZE.min(self.remaining as usize);
        let mut buffer = vec![0u8; size];
        let n = source.read(&mut buffer).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before request body was complete",
            ));
        }
        buffer.truncate(n);
        self.remaining -= n as u64;
        Ok(Some(Bytes::from(buffer)))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("buffered", &self.buffered.len())
            .field("remaining", &self.remaining)
            .field("declared", &self.declared)
            .finish()
    }
}
