use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use bytes::Bytes;
use filegate::{
    Body, Exception, Flow, Middleware, MultipartParser, Request, RequestContext, Response, Router,
};
use serde_json::json;

fn context(raw_head: &str, body: &'static [u8]) -> RequestContext {
    let request = Request::try_from(raw_head.as_bytes(), 0).unwrap();
    RequestContext::new(0, request, Body::from_bytes(Bytes::from_static(body))).unwrap()
}

fn get(path: &str) -> RequestContext {
    context(&format!("GET {} HTTP/1.1\r\nHost: localhost", path), b"")
}

fn tagged(
    tag: &'static str,
) -> impl Fn(RequestContext) -> std::future::Ready<Result<Response, Exception>> + Send + Sync {
    move |ctx: RequestContext| {
        let params: Vec<(String, String)> = ctx
            .params()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        std::future::ready(Ok(Response::json(200, &json!({ "route": tag, "params": params }))))
    }
}

/// 一个会把解析结果放进上下文的最小 multipart 中间件
struct ParseFiles;

#[async_trait]
impl Middleware for ParseFiles {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<Flow, Exception> {
        let content_type = ctx.request().content_type().unwrap_or("").to_string();
        let boundary = match MultipartParser::get_boundary(&content_type) {
            Some(b) => b,
            None => return Ok(Flow::Respond(Response::error(400, "no boundary"))),
        };
        let mut parser = MultipartParser::new(&boundary);
        while let Some(chunk) = ctx
            .body_mut()
            .chunk()
            .await
            .map_err(|e| Exception::BodyRead(e.to_string()))?
        {
            parser.append_data(&chunk);
        }
        ctx.set_files(parser.parse());
        Ok(Flow::Next)
    }
}

#[tokio::test]
async fn test_first_registered_match_wins() {
    let mut router = Router::new();
    router.get("/files/:key", tagged("param"), vec![]);
    router.get("/files/special", tagged("literal"), vec![]);

    let response = router.dispatch(get("/files/special")).await.unwrap();
    assert_eq!(response.json_body().unwrap()["route"], "param");

    let mut router = Router::new();
    router.get("/files/special", tagged("literal"), vec![]);
    router.get("/files/:key", tagged("param"), vec![]);

    let response = router.dispatch(get("/files/special")).await.unwrap();
    assert_eq!(response.json_body().unwrap()["route"], "literal");
    let response = router.dispatch(get("/files/other")).await.unwrap();
    assert_eq!(response.json_body().unwrap()["route"], "param");
}

#[tokio::test]
async fn test_params_follow_pattern_order() {
    let mut router = Router::new();
    router.get("/buckets/:bucket/files/:key", tagged("nested"), vec![]);

    let response = router.dispatch(get("/buckets/media/files/a%20b.png")).await.unwrap();
    assert_eq!(
        response.json_body().unwrap()["params"],
        json!([["bucket", "media"], ["key", "a b.png"]])
    );
}

#[tokio::test]
async fn test_unmatched_requests_are_404() {
    let mut router = Router::new();
    router.get("/files/:key", tagged("param"), vec![]);

    for ctx in [
        get("/files"),
        get("/files/"),
        get("/files/a/b"),
        get("/Files/a"),
        context("DELETE /files/a HTTP/1.1\r\nHost: x", b""),
        context("BREW /files/a HTTP/1.1\r\nHost: x", b""),
    ] {
        let response = router.dispatch(ctx).await.unwrap();
        assert_eq!(response.status_code(), 404);
        assert_eq!(response.json_body().unwrap(), json!({ "error": "Route not found" }));
    }
}

#[tokio::test]
async fn test_put_binds_key_and_files() {
    let seen = Arc::new(Mutex::new(None));
    let seen_clone = Arc::clone(&seen);

    let parse_files: Arc<dyn Middleware> = Arc::new(ParseFiles);
    let mut router = Router::new();
    router.put(
        "/files/:key",
        move |mut ctx: RequestContext| {
            let seen = Arc::clone(&seen_clone);
            async move {
                let key = ctx.param("key").unwrap_or("").to_string();
                let files = ctx.take_files();
                *seen.lock().unwrap() = Some((key, files));
                Ok::<_, Exception>(Response::json(200, &json!({ "ok": true })))
            }
        },
        vec![parse_files],
    );

    let ctx = context(
        "PUT /files/key1 HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=XYZ\r\nContent-Length: 84",
        b"--XYZ\r\nContent-Disposition: form-data; name=\"f\"; filename=\"n.png\"\r\n\r\nDATA\r\n--XYZ--\r\n",
    );
    let response = router.dispatch(ctx).await.unwrap();
    assert_eq!(response.status_code(), 200);

    let (key, files) = seen.lock().unwrap().take().unwrap();
    assert_eq!(key, "key1");
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "n.png");
    assert_eq!(files[0].content_type, "application/octet-stream");
    assert_eq!(&files[0].data[..], b"DATA");
}

#[tokio::test]
async fn test_short_circuit_skips_later_stages() {
    let later = Arc::new(AtomicUsize::new(0));
    let handled = Arc::new(AtomicUsize::new(0));

    let mut router = Router::new();
    router.add_global_middleware(Arc::new(|_ctx: &mut RequestContext| {
        Ok::<_, Exception>(Flow::Respond(Response::error(403, "blocked")))
    }));

    let later_clone = Arc::clone(&later);
    let counter: Arc<dyn Middleware> = Arc::new(move |_ctx: &mut RequestContext| {
        later_clone.fetch_add(1, Ordering::SeqCst);
        Ok::<_, Exception>(Flow::Next)
    });
    let handled_clone = Arc::clone(&handled);
    router.get(
        "/files/:key",
        move |_ctx: RequestContext| {
            let handled = Arc::clone(&handled_clone);
            async move {
                handled.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Exception>(Response::new())
            }
        },
        vec![counter],
    );

    let response = router.dispatch(get("/files/a")).await.unwrap();
    assert_eq!(response.status_code(), 403);
    assert_eq!(later.load(Ordering::SeqCst), 0);
    assert_eq!(handled.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_middleware_error_propagates() {
    let failing: Arc<dyn Middleware> = Arc::new(|_ctx: &mut RequestContext| {
        Err::<Flow, _>(Exception::Storage("backend unavailable".to_string()))
    });
    let mut router = Router::new();
    router.get("/files/:key", tagged("param"), vec![failing]);

    let err = router.dispatch(get("/files/a")).await.unwrap_err();
    assert_eq!(err.to_string(), "Storage error: backend unavailable");
}
