use crate::param::*;

use brotli::enc::{self, backward_references::BrotliEncoderParams};
use bytes::Bytes;
use chrono::prelude::*;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::{debug, error};
use serde_json::{json, Value};

use std::io::{self, Write};

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    content_length: u64,
    date: DateTime<Utc>,
    content_encoding: Option<HttpEncoding>,
    server_name: String,
    content: Option<Bytes>,
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            content_length: 0,
            date: Utc::now(),
            content_encoding: None,
            server_name: SERVER_NAME.to_string(),
            content: None,
        }
    }

    /// 任意字节内容的响应
    pub fn bytes(code: u16, content_type: &str, content: Bytes) -> Self {
        let mut response = Self::new();
        response.set_code(code);
        response.content_length = content.len() as u64;
        response.content_type = Some(content_type.to_string());
        response.content = Some(content);
        response
    }

    /// JSON 响应
    pub fn json(code: u16, value: &Value) -> Self {
        let body = value.to_string();
        Self::bytes(code, JSON_CONTENT_TYPE, Bytes::from(body))
    }

    /// `{"error": message}` 形式的错误响应
    pub fn error(code: u16, message: &str) -> Self {
        Self::json(code, &json!({ "error": message }))
    }

    /// 不带 JSON 包装的纯文本响应，仅用于请求头都无法解析的情况
    pub fn plain(code: u16) -> Self {
        let mut response = Self::new();
        response.set_code(code);
        let text = response.information.clone();
        response.content_length = text.len() as u64;
        response.content_type = Some("text/plain".to_string());
        response.content = Some(Bytes::from(text));
        response
    }

    pub fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&info) => info.to_string(),
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                "Unknown".to_string()
            }
        };
        self
    }

    /// 根据客户端声明的 `Accept-Encoding` 压缩响应体。
    ///
    /// 已经压缩过的媒体类型（图片、压缩包等）会被跳过；压缩失败时保留原始内容。
    pub fn encode(&mut self, accept_encoding: &[HttpEncoding], id: u128) -> &mut Self {
        if self.content_encoding.is_some() {
            return self;
        }
        let content = match &self.content {
            Some(c) if !c.is_empty() => c.clone(),
            _ => return self,
        };
        if let Some(mime) = &self.content_type {
            if should_skip_compression(mime) {
                debug!("[ID{}]文件类型: {}, 跳过压缩", id, mime);
                return self;
            }
        }
        let encoding = match decide_encoding(accept_encoding) {
            Some(e) => e,
            None => return self,
        };
        match compress(content.to_vec(), Some(encoding)) {
            Ok(compressed) => {
                self.content_length = compressed.len() as u64;
                self.content = Some(Bytes::from(compressed));
                self.content_encoding = Some(encoding);
            }
            Err(e) => {
                error!("[ID{}]压缩响应失败: {}，返回未压缩内容", id, e);
            }
        }
        self
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let version: &str = match self.version {
            HttpVersion::V1_0 => "HTTP/1.0",
            HttpVersion::V1_1 => "HTTP/1.1",
        };
        let status_code: &str = &self.status_code.to_string();
        let information: &str = &self.information;
        let content_length: &str = &self.content_length.to_string();
        let date: &str = &format_date(&self.date);
        let server: &str = &self.server_name;

        let header = [
            version,
            " ",
            status_code,
            " ",
            information,
            CRLF,
            match &self.content_type {
                Some(t) => ["Content-Type: ", t, CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            match self.content_encoding {
                Some(e) => ["Content-Encoding: ", &e.to_string(), CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            "Content-Length: ",
            content_length,
            CRLF,
            "Date: ",
            date,
            CRLF,
            "Server: ",
            server,
            CRLF,
            "Connection: close",
            CRLF,
            CRLF,
        ]
        .concat();
        [
            header.as_bytes(),
            match &self.content {
                Some(c) => &c[..],
                None => &[],
            },
        ]
        .concat()
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_encoding(&self) -> Option<HttpEncoding> {
        self.content_encoding
    }

    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }

    /// 把响应体按 JSON 解析，响应体不是 JSON 时返回 `None`
    pub fn json_body(&self) -> Option<Value> {
        let content = self.content.as_ref()?;
        serde_json::from_slice(content).ok()
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc2822()
}

fn compress(data: Vec<u8>, mode: Option<HttpEncoding>) -> io::Result<Vec<u8>> {
    let original_size = data.len();
    let result = match mode {
        Some(HttpEncoding::Gzip) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Deflate) => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Br) => {
            let params = BrotliEncoderParams::default();
            let mut output = Vec::new();
            enc::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
            Ok(output)
        }
        None => Ok(data),
    };

    if let Ok(ref compressed) = result {
        debug!(
            "压缩完成: {:?}, 原始大小: {} bytes, 压缩后: {} bytes",
            mode,
            original_size,
            compressed.len()
        );
    }

    result
}

fn should_skip_compression(mime_type: &str) -> bool {
    let skip_types = [
        "image/jpeg",
        "image/jpg",
        "image/png",
        "image/gif",
        "image/webp",
        "video/",
        "audio/",
        "application/pdf",
        "application/zip",
        "application/x-7z-compressed",
        "application/gzip",
        "application/x-gzip",
        "font/woff",
        "font/woff2",
    ];

    skip_types
        .iter()
        .any(|&skip_type| mime_type.starts_with(skip_type))
}

fn decide_encoding(accept_encoding: &[HttpEncoding]) -> Option<HttpEncoding> {
    if accept_encoding.contains(&HttpEncoding::Gzip) {
        Some(HttpEncoding::Gzip)
    } else if accept_encoding.contains(&HttpEncoding::Deflate) {
        Some(HttpEncoding::Deflate)
    } else if accept_encoding.contains(&HttpEncoding::Br) {
        Some(HttpEncoding::Br)
    } else {
        None
    }
}
