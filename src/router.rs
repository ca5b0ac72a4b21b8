// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由模块
//!
//! 负责路由注册、全局中间件管理以及请求分发。
//!
//! ## 匹配规则
//! 同一方法下的路由按**注册顺序**逐一尝试，第一个匹配成功的路由胜出（first-match-wins），
//! 而不是选择最长或最具体的模式。例如先注册 `/files/:key` 再注册 `/files/special`，
//! 对 `/files/special` 的请求仍然会命中前者。编写路由时请把更具体的模式放在前面。
//!
//! ## 生命周期
//! 路由表在启动阶段构建完毕，随后以 `Arc<Router>` 的形式只读共享给所有连接任务，
//! 因此处理请求时不需要任何锁。

use std::{collections::HashMap, sync::Arc};

use log::debug;
use serde_json::json;

use crate::{
    context::RequestContext,
    exception::Exception,
    matcher::{Params, PathMatcher},
    param::HttpRequestMethod,
    pipeline::{Handler, Middleware, Pipeline},
    response::Response,
};

/// 已注册的路由，注册后不再修改
pub struct Route {
    method: HttpRequestMethod,
    matcher: PathMatcher,
    handler: Arc<dyn Handler>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Route {
    pub fn method(&self) -> &HttpRequestMethod {
        &self.method
    }

    pub fn pattern(&self) -> &str {
        self.matcher.pattern()
    }
}

pub struct Router {
    routes: HashMap<HttpRequestMethod, Vec<Route>>,
    global_middlewares: Vec<Arc<dyn Middleware>>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            global_middlewares: Vec::new(),
        }
    }

    /// 追加一个对所有路由生效的中间件，应在开始接受连接之前调用
    pub fn add_global_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.global_middlewares.push(middleware);
    }

    /// 注册路由。
    ///
    /// 重复注册相同的 (方法, 模式) 会覆盖之前的处理函数与中间件，但保留其原有的匹配顺序。
    pub fn register<H>(
        &mut self,
        method: HttpRequestMethod,
        pattern: &str,
        handler: H,
        middlewares: Vec<Arc<dyn Middleware>>,
    ) where
        H: Handler + 'static,
    {
        let route = Route {
            method: method.clone(),
            matcher: PathMatcher::compile(pattern),
            handler: Arc::new(handler),
            middlewares,
        };
        let routes = self.routes.entry(method).or_default();
        match routes.iter_mut().find(|r| r.pattern() == pattern) {
            Some(existing) => *existing = route,
            None => routes.push(route),
        }
    }

    pub fn get<H>(&mut self, pattern: &str, handler: H, middlewares: Vec<Arc<dyn Middleware>>)
    where
        H: Handler + 'static,
    {
        self.register(HttpRequestMethod::Get, pattern, handler, middlewares);
    }

    pub fn post<H>(&mut self, pattern: &str, handler: H, middlewares: Vec<Arc<dyn Middleware>>)
    where
        H: Handler + 'static,
    {
        self.register(HttpRequestMethod::Post, pattern, handler, middlewares);
    }

    pub fn put<H>(&mut self, pattern: &str, handler: H, middlewares: Vec<Arc<dyn Middleware>>)
    where
        H: Handler + 'static,
    {
        self.register(HttpRequestMethod::Put, pattern, handler, middlewares);
    }

    pub fn delete<H>(&mut self, pattern: &str, handler: H, middlewares: Vec<Arc<dyn Middleware>>)
    where
        H: Handler + 'static,
    {
        self.register(HttpRequestMethod::Delete, pattern, handler, middlewares);
    }

    /// 已注册的路由总数
    pub fn route_count(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    /// 按 first-match-wins 规则查找路由，返回路由及提取出的参数
    pub fn resolve(&self, method: &HttpRequestMethod, path: &str) -> Option<(&Route, Params)> {
        self.routes
            .get(method)?
            .iter()
            .find_map(|route| route.matcher.matches(path).map(|params| (route, params)))
    }

    /// 分发一个请求。
    ///
    /// 没有匹配的路由时返回 404；匹配成功后绑定路由参数，依次执行全局中间件、
    /// 路由中间件和处理函数。中间件或处理函数返回的错误会原样向上传递。
    pub async fn dispatch(&self, mut ctx: RequestContext) -> Result<Response, Exception> {
        let id = ctx.id();
        let method = ctx.request().method().clone();

        let (route, params) = match self.resolve(&method, ctx.path()) {
            Some(found) => found,
            None => {
                debug!("[ID{}]没有匹配的路由：{} {}", id, method, ctx.path());
                return Ok(Response::json(404, &json!({ "error": "Route not found" })));
            }
        };
        debug!(
            "[ID{}]命中路由：{} {}，参数：{:?}",
            id,
            route.method(),
            route.pattern(),
            params
        );
        ctx.set_params(params);

        Pipeline::new(&self.global_middlewares, &route.middlewares)
            .run(ctx, route.handler.as_ref())
            .await
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
