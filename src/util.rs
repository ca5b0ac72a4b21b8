use std::borrow::Cow;

use percent_encoding::percent_decode_str;

use crate::exception::Exception;

/// 在 `haystack[from..]` 中查找 `needle` 第一次出现的位置（返回绝对下标）
pub fn find_subsequence(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() || haystack.len() - from < needle.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

/// 去掉请求目标中的查询字符串和片段，只保留路径部分
pub fn strip_query(target: &str) -> &str {
    let end = target.find(&['?', '#'][..]).unwrap_or(target.len());
    &target[..end]
}

/// 对路径进行百分号解码。
///
/// `%` 后必须紧跟两位十六进制数字，解码结果必须是合法的 UTF-8，否则返回 `InvalidPath`。
/// `+` 不做特殊处理（它只在查询字符串中表示空格）。
pub fn decode_path(path: &str) -> Result<String, Exception> {
    // percent_decode_str 会原样保留不完整的转义，这里先拒绝
    let bytes = path.as_bytes();
    let malformed = bytes.iter().enumerate().any(|(i, &b)| {
        b == b'%'
            && !bytes
                .get(i + 1..i + 3)
                .map_or(false, |hex| hex.iter().all(u8::is_ascii_hexdigit))
    });
    if malformed {
        return Err(Exception::InvalidPath);
    }
    percent_decode_str(path)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|_| Exception::InvalidPath)
}

/// 把字节数格式化为便于阅读的字符串，用于日志输出
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if size < KB {
        format!("{}B", size)
    } else if size < MB {
        format!("{:.1}KB", size as f64 / KB as f64)
    } else if size < GB {
        format!("{:.1}MB", size as f64 / MB as f64)
    } else {
        format!("{:.1}GB", size as f64 / GB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_subsequence() {
        let data = b"abc--xyz--xyz";
        assert_eq!(find_subsequence(data, b"--xyz", 0), Some(3));
        assert_eq!(find_subsequence(data, b"--xyz", 4), Some(8));
        assert_eq!(find_subsequence(data, b"--xyz", 9), None);
        assert_eq!(find_subsequence(data, b"", 0), None);
        assert_eq!(find_subsequence(data, b"a", 100), None);
    }

    #[test]
    fn test_strip_query() {
        assert_eq!(strip_query("/files/a?x=1"), "/files/a");
        assert_eq!(strip_query("/files/a#top"), "/files/a");
        assert_eq!(strip_query("/files/a"), "/files/a");
    }

    #[test]
    fn test_decode_path_space_and_utf8() {
        assert_eq!(decode_path("/files/a%20b").unwrap(), "/files/a b");
        assert_eq!(decode_path("/files/%E6%96%87%E4%BB%B6").unwrap(), "/files/文件");
        assert_eq!(decode_path("/files/a+b").unwrap(), "/files/a+b");
    }

    #[test]
    fn test_decode_path_invalid() {
        assert_eq!(decode_path("/files/%2"), Err(Exception::InvalidPath));
        assert_eq!(decode_path("/files/%"), Err(Exception::InvalidPath));
        assert_eq!(decode_path("/files/%zz"), Err(Exception::InvalidPath));
        assert_eq!(decode_path("/files/%FF"), Err(Exception::InvalidPath));
        assert_eq!(decode_path("/files/%2x1"), Err(Exception::InvalidPath));
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(512), "512B");
        assert_eq!(format_file_size(2048), "2.0KB");
        assert_eq!(format_file_size(3 * 1024 * 1024), "3.0MB");
    }
}
