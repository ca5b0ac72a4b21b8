//! 单个请求在中间件管道中流转的上下文

use crate::{
    exception::Exception,
    matcher::Params,
    multipart::FilePart,
    request::{Body, Request},
    util::decode_path,
};

/// 每个请求独占的上下文，随管道以 `&mut` 传递，最后交给处理函数。
#[derive(Debug)]
pub struct RequestContext {
    id: u128,
    request: Request,
    path: String,
    params: Params,
    files: Option<Vec<FilePart>>,
    body: Body,
}

impl RequestContext {
    /// 创建上下文。路径在这里完成一次百分号解码，之后的路由匹配都基于解码后的路径。
    pub fn new(id: u128, request: Request, body: Body) -> Result<Self, Exception> {
        let path = decode_path(request.path())?;
        Ok(Self {
            id,
            request,
            path,
            params: Params::new(),
            files: None,
            body,
        })
    }

    pub fn id(&self) -> u128 {
        self.id
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// 解码后的请求路径（不含查询参数）
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub(crate) fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    /// multipart 中间件解析出的文件；中间件未运行时为 `None`
    pub fn files(&self) -> Option<&[FilePart]> {
        self.files.as_deref()
    }

    pub fn set_files(&mut self, files: Vec<FilePart>) {
        self.files = Some(files);
    }

    /// 取走解析出的文件，所有权交给处理函数
    pub fn take_files(&mut self) -> Vec<FilePart> {
        self.files.take().unwrap_or_default()
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }
}
