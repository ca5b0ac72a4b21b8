// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了文件网关在请求处理生命周期中可能抛出的各类异常情况。
//!
//! ## 设计意图
//! - **错误分类**：涵盖了协议解析错误、请求体读取错误、存储层错误以及配置错误。
//! - **语义映射**：每个变体都对应了特定的业务逻辑，便于上层模块将其转化为对应的 HTTP 响应状态码。
//! - **用户友好**：通过实现 `std::fmt::Display`，确保错误信息可以被安全地记录到日志或以 JSON 形式返回给客户端。

use std::{fmt, io};

/// 网关处理请求过程中发生的异常类型。
///
/// 该枚举通常作为 `Result` 的 `Err` 部分返回，用于指示处理失败的具体原因。
/// 凡是越过路由分发边界的异常，都会被服务端统一转换为 `500` 响应。
#[derive(Debug, Clone, PartialEq)]
pub enum Exception {
    /// 客户端发送的请求头无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 请求行格式不正确（缺少方法、路径或版本）。
    MalformedRequestLine,
    /// 客户端使用了服务器不支持的 HTTP 协议版本。
    UnsupportedHttpVersion,
    /// 请求头超过了服务器允许的最大长度。
    HeaderTooLarge,
    /// `Content-Length` 不是合法的非负整数。
    InvalidContentLength,
    /// 请求路径中的百分号编码非法。对应 `400 Bad Request`。
    InvalidPath,
    /// 读取请求体时底层连接出错（连接重置、提前关闭等）。
    BodyRead(String),
    /// 指定的对象键在存储中不存在。
    FileNotFound(String),
    /// 对象键包含路径分隔符或 `..` 等非法内容。
    InvalidKey(String),
    /// 存储层 I/O 失败。
    Storage(String),
    /// 配置文件读取或校验失败。
    Config(String),
}

use Exception::*;

/// 为 `Exception` 实现 `Display` 特性，使其支持字符串格式化输出。
///
/// 这些描述信息会原样写入 `{"error": ...}` 响应体，因此保持简短且面向客户端。
impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            MalformedRequestLine => write!(f, "Malformed request line"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            HeaderTooLarge => write!(f, "Request header too large"),
            InvalidContentLength => write!(f, "Invalid Content-Length"),
            InvalidPath => write!(f, "Invalid path"),
            BodyRead(e) => write!(f, "Failed to read request body: {}", e),
            FileNotFound(key) => write!(f, "File with key '{}' does not exist.", key),
            InvalidKey(key) => write!(f, "Invalid file key '{}'", key),
            Storage(e) => write!(f, "Storage error: {}", e),
            Config(e) => write!(f, "Validation failed for configuration: {}", e),
        }
    }
}

impl std::error::Error for Exception {}

impl From<io::Error> for Exception {
    fn from(e: io::Error) -> Self {
        Storage(e.to_string())
    }
}
