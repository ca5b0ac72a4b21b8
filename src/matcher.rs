//! # 路径匹配器
//!
//! 将形如 `/files/:key` 的路由模式编译为按段比较的匹配器。
//!
//! - 以 `:` 开头且名称非空的段为参数段，匹配任意一个非空、不含 `/` 的路径段；
//! - 其余段按字节逐一比较（大小写敏感）；
//! - 段数必须完全一致，不支持尾部通配或可选段。
//!
//! 传入的路径应当已经完成百分号解码，因此提取出的参数值即为解码后的字符串。

/// 路由模式中的单个段
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// 按出现顺序保存的路由参数
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_string(), value.to_string()));
    }

    /// 按名称查找参数值
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// 按模式中从左到右的顺序遍历参数
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 编译后的路径匹配器
#[derive(Debug, Clone)]
pub struct PathMatcher {
    pattern: String,
    segments: Vec<Segment>,
}

impl PathMatcher {
    pub fn compile(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .map(|seg| match seg.strip_prefix(':') {
                Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
                _ => Segment::Literal(seg.to_string()),
            })
            .collect();
        Self {
            pattern: pattern.to_string(),
            segments,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// 模式中声明的参数名，按出现顺序
    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|seg| match seg {
                Segment::Param(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// 尝试匹配一个已解码的路径，成功时返回提取出的参数
    pub fn matches(&self, path: &str) -> Option<Params> {
        let mut params = Params::new();
        let mut parts = path.split('/');
        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(literal) => {
                    if literal.as_bytes() != part.as_bytes() {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    params.push(name, part);
                }
            }
        }
        // 路径段数多于模式段数
        if parts.next().is_some() {
            return None;
        }
        Some(params)
    }
}
