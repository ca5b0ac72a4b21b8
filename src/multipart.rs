// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # multipart/form-data 解析模块
//!
//! 该模块不依赖任何第三方解析库，直接在字节缓冲区上扫描分隔符，
//! 从 `multipart/form-data` 请求体中提取出各个文件分段。
//!
//! ## 工作方式
//! 1. `append_data` 按到达顺序把数据块追加到内部缓冲区，期间不做任何解码；
//! 2. 请求体读取完毕后调用一次 `parse`，同步扫描整个缓冲区；
//! 3. 每两个相邻的 `--<boundary>` 之间为一个分段，去掉首尾用于分帧的 CRLF 后，
//!    在第一个空行处拆分为头部与正文。
//!
//! ## 宽松降级
//! - 结构残缺的分段（找不到头部与正文的分界）会被静默丢弃；
//! - 请求体中没有成对的分隔符时返回空列表，而不是报错；
//! - 没有 `filename` 属性的分段同样会被返回（名称为 `unnamed`），是否接受由调用方决定；
//! - 结尾的 `--` 不做特殊处理，扫描在找不到下一个分隔符时自然结束。

use bytes::{Bytes, BytesMut};

use crate::{
    param::{OCTET_STREAM, UNNAMED_FILE},
    util::find_subsequence,
};

const PART_HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
/// 每个分段在起始分隔符之后、下一个分隔符之前各有一个 CRLF
const FRAMING_CRLF_LEN: usize = 2;
const QUOTES: &[char] = &['"', '\''];

/// 从 multipart 请求体中提取出的单个文件分段
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    /// 原始文件名，缺失时为 `unnamed`
    pub name: String,
    /// 分段声明的 MIME 类型，缺失时为 `application/octet-stream`
    pub content_type: String,
    /// 分段正文，与解析器缓冲区共享底层内存
    pub data: Bytes,
}

/// 单次请求的 multipart 解析状态
#[derive(Debug)]
pub struct MultipartParser {
    buffer: BytesMut,
    /// `--` 加上 Content-Type 中声明的 boundary
    boundary: Vec<u8>,
}

impl MultipartParser {
    pub fn new(boundary: &str) -> Self {
        let mut delimiter = Vec::with_capacity(boundary.len() + 2);
        delimiter.extend_from_slice(b"--");
        delimiter.extend_from_slice(boundary.as_bytes());
        Self {
            buffer: BytesMut::new(),
            boundary: delimiter,
        }
    }

    /// 追加一块请求体数据。可以按任意粒度多次调用。
    pub fn append_data(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// 已缓冲的字节数
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// 扫描整个缓冲区并返回所有可解析的分段。解析器在此之后被消耗。
    pub fn parse(self) -> Vec<FilePart> {
        let data = self.buffer.freeze();
        let delimiter = self.boundary.as_slice();
        let mut files = Vec::new();
        let mut part_start = 0;

        loop {
            let boundary_index = match find_subsequence(&data, delimiter, part_start) {
                Some(index) => index,
                None => break,
            };
            let after_boundary = boundary_index + delimiter.len();
            let next_boundary_index = match find_subsequence(&data, delimiter, after_boundary) {
                Some(index) => index,
                None => break,
            };

            let start = after_boundary + FRAMING_CRLF_LEN;
            let end = next_boundary_index.saturating_sub(FRAMING_CRLF_LEN);
            if start <= end {
                if let Some(part) = Self::split_part(data.slice(start..end)) {
                    files.push(part);
                }
            }
            part_start = next_boundary_index;
        }

        files
    }

    /// 在第一个空行处拆分头部与正文，找不到空行时返回 `None`
    fn split_part(part: Bytes) -> Option<FilePart> {
        let headers_end = find_subsequence(&part, PART_HEADER_TERMINATOR, 0)?;
        let headers = String::from_utf8_lossy(&part[..headers_end]);
        let data = part.slice(headers_end + PART_HEADER_TERMINATOR.len()..);

        let mut name = None;
        let mut content_type = None;
        for line in headers.split("\r\n") {
            let (field, value) = match line.split_once(':') {
                Some(pair) => pair,
                None => continue,
            };
            let field = field.trim();
            if field.eq_ignore_ascii_case("content-disposition") {
                name = extract_filename(value);
            } else if field.eq_ignore_ascii_case("content-type") {
                let value = value.trim();
                if !value.is_empty() {
                    content_type = Some(value.to_string());
                }
            }
        }

        Some(FilePart {
            name: name.unwrap_or_else(|| UNNAMED_FILE.to_string()),
            content_type: content_type.unwrap_or_else(|| OCTET_STREAM.to_string()),
            data,
        })
    }

    /// 从 `Content-Type` 头中取出 boundary。
    ///
    /// 支持 `multipart/form-data; boundary=XYZ` 以及带引号的 `boundary="XYZ"`。
    /// 没有 boundary 属性或其值为空时返回 `None`，调用方应在读取请求体之前拒绝该请求。
    pub fn get_boundary(content_type: &str) -> Option<String> {
        for item in content_type.split(';') {
            let (key, value) = match item.trim().split_once('=') {
                Some(pair) => pair,
                None => continue,
            };
            if !key.trim().eq_ignore_ascii_case("boundary") {
                continue;
            }
            let value = value.trim();
            let value = value.strip_prefix(QUOTES).unwrap_or(value);
            let value = value.strip_suffix(QUOTES).unwrap_or(value);
            if value.is_empty() {
                return None;
            }
            return Some(value.to_string());
        }
        None
    }

    /// 判断 `Content-Type` 是否为 `multipart/form-data`（大小写不敏感）
    pub fn is_multipart(content_type: &str) -> bool {
        let prefix = "multipart/form-data";
        content_type.len() >= prefix.len()
            && content_type.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    }
}

/// 解析 `form-data; name="file"; filename="a.png"` 中的文件名
fn extract_filename(disposition: &str) -> Option<String> {
    let disposition = disposition.trim();
    if disposition.len() < "form-data".len()
        || !disposition.as_bytes()[.."form-data".len()].eq_ignore_ascii_case(b"form-data")
    {
        return None;
    }
    let marker = "filename=\"";
    let start = disposition.find(marker)? + marker.len();
    let rest = &disposition[start..];
    let end = rest.find('"')?;
    if end == 0 {
        return None;
    }
    Some(rest[..end].to_string())
}
