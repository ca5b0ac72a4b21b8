//! # 中间件管道
//!
//! 中间件在处理函数之前依次执行，每一级返回一个控制信号：
//! - `Flow::Next`：继续执行下一级；
//! - `Flow::Respond(response)`：直接结束请求，后续中间件与处理函数都不会执行。
//!
//! 由于每一级只能返回其中一种信号，"既继续又响应"或"既不继续也不响应"在类型上无法表达。
//! 中间件返回 `Err` 时管道立即中止，错误原样交给调用方（服务端会将其转换为 500）。
//! 每一级都可以在返回前 `.await`，但下一级一定在上一级返回之后才开始。

use std::{future::Future, sync::Arc};

use async_trait::async_trait;

use crate::{context::RequestContext, exception::Exception, response::Response};

/// 中间件的执行结果
#[derive(Debug)]
pub enum Flow {
    Next,
    Respond(Response),
}

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<Flow, Exception>;
}

/// 同步闭包也可以直接作为中间件使用
#[async_trait]
impl<F> Middleware for F
where
    F: Fn(&mut RequestContext) -> Result<Flow, Exception> + Send + Sync,
{
    async fn handle(&self, ctx: &mut RequestContext) -> Result<Flow, Exception> {
        (self)(ctx)
    }
}

/// 路由的终端处理函数，获得上下文的所有权
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: RequestContext) -> Result<Response, Exception>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, Exception>> + Send,
{
    async fn call(&self, ctx: RequestContext) -> Result<Response, Exception> {
        (self)(ctx).await
    }
}

/// 一次请求的中间件序列加上游标
pub struct Pipeline<'a> {
    stages: Vec<&'a Arc<dyn Middleware>>,
    cursor: usize,
}

impl<'a> Pipeline<'a> {
    /// 先执行全局中间件，再执行路由自身的中间件，均按注册顺序
    pub fn new(global: &'a [Arc<dyn Middleware>], route: &'a [Arc<dyn Middleware>]) -> Self {
        Self {
            stages: global.iter().chain(route.iter()).collect(),
            cursor: 0,
        }
    }

    /// 驱动管道直到某一级给出响应，或者全部通过后调用处理函数
    pub async fn run(
        mut self,
        mut ctx: RequestContext,
        handler: &dyn Handler,
    ) -> Result<Response, Exception> {
        while self.cursor < self.stages.len() {
            let stage = self.stages[self.cursor];
            self.cursor += 1;
            match stage.handle(&mut ctx).await? {
                Flow::Next => continue,
                Flow::Respond(response) => return Ok(response),
            }
        }
        handler.call(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{Body, Request};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    fn ctx() -> RequestContext {
        let request = Request::try_from(b"GET /files HTTP/1.1\r\nHost: localhost", 0).unwrap();
        RequestContext::new(0, request, Body::empty()).unwrap()
    }

    struct Record {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Middleware for Record {
        async fn handle(&self, _ctx: &mut RequestContext) -> Result<Flow, Exception> {
            tokio::task::yield_now().await;
            self.log.lock().unwrap().push(self.name);
            Ok(Flow::Next)
        }
    }

    #[tokio::test]
    async fn test_global_then_route_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stage = |name| -> Arc<dyn Middleware> {
            Arc::new(Record {
                name,
                log: Arc::clone(&log),
            })
        };
        let global = vec![stage("g1"), stage("g2")];
        let route = vec![stage("r1"), stage("r2")];
        let handler_log = Arc::clone(&log);
        let handler = move |_ctx: RequestContext| {
            let log = Arc::clone(&handler_log);
            async move {
                log.lock().unwrap().push("handler");
                Ok::<_, Exception>(Response::new())
            }
        };

        let response = Pipeline::new(&global, &route).run(ctx(), &handler).await.unwrap();
        assert_eq!(response.status_code(), 200);
        assert_eq!(*log.lock().unwrap(), vec!["g1", "g2", "r1", "r2", "handler"]);
    }

    #[tokio::test]
    async fn test_short_circuit_stops_chain() {
        let later = Arc::new(AtomicUsize::new(0));
        let handled = Arc::new(AtomicUsize::new(0));

        let reject: Arc<dyn Middleware> = Arc::new(|_ctx: &mut RequestContext| {
            Ok::<_, Exception>(Flow::Respond(Response::error(400, "nope")))
        });
        let later_clone = Arc::clone(&later);
        let counter: Arc<dyn Middleware> = Arc::new(move |_ctx: &mut RequestContext| {
            later_clone.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Exception>(Flow::Next)
        });
        let handled_clone = Arc::clone(&handled);
        let handler = move |_ctx: RequestContext| {
            let handled = Arc::clone(&handled_clone);
            async move {
                handled.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Exception>(Response::new())
            }
        };

        let global = vec![reject];
        let route = vec![counter];
        let response = Pipeline::new(&global, &route).run(ctx(), &handler).await.unwrap();

        assert_eq!(response.status_code(), 400);
        assert_eq!(later.load(Ordering::SeqCst), 0);
        assert_eq!(handled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_error_aborts_pipeline() {
        let failing: Arc<dyn Middleware> = Arc::new(|_ctx: &mut RequestContext| {
            Err::<Flow, _>(Exception::Storage("disk".to_string()))
        });
        let handler = |_ctx: RequestContext| async { Ok::<_, Exception>(Response::new()) };
        let global = vec![failing];

        let result = Pipeline::new(&global, &[]).run(ctx(), &handler).await;
        assert_eq!(result.unwrap_err(), Exception::Storage("disk".to_string()));
    }
}
