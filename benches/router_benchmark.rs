use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use filegate::{
    matcher::PathMatcher, param::HttpRequestMethod, request::Request, Exception, RequestContext,
    Response, Router,
};

fn noop(_ctx: RequestContext) -> std::future::Ready<Result<Response, Exception>> {
    std::future::ready(Ok(Response::new()))
}

fn router_with_routes(count: usize) -> Router {
    let mut router = Router::new();
    for i in 0..count {
        router.get(&format!("/static/route{}", i), noop, vec![]);
    }
    router.get("/files/:key", noop, vec![]);
    router
}

fn matcher_benchmark(c: &mut Criterion) {
    let matcher = PathMatcher::compile("/buckets/:bucket/files/:key");

    c.bench_function("path_matcher_hit", |b| {
        b.iter(|| matcher.matches(black_box("/buckets/media/files/photo.png")));
    });
    c.bench_function("path_matcher_miss", |b| {
        b.iter(|| matcher.matches(black_box("/buckets/media/other/photo.png")));
    });
}

fn resolve_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("router_resolve_last_route");

    for count in [1, 10, 100].iter() {
        let router = router_with_routes(*count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &router, |b, router| {
            b.iter(|| {
                router.resolve(black_box(&HttpRequestMethod::Get), black_box("/files/a.png"))
            });
        });
    }

    group.finish();
}

fn request_parse_benchmark(c: &mut Criterion) {
    let request = b"PUT /files/report%202024.pdf HTTP/1.1\r\n\
                    Host: localhost:3000\r\n\
                    User-Agent: Mozilla/5.0 (Windows NT 10.0; Win64; x64)\r\n\
                    Content-Type: multipart/form-data; boundary=----WebKitFormBoundary7MA4YWxkTrZu0gW\r\n\
                    Content-Length: 1048576\r\n\
                    Accept-Encoding: gzip, deflate, br";

    c.bench_function("request_head_parse", |b| {
        b.iter(|| {
            let buffer = black_box(request.to_vec());
            let _ = Request::try_from(&buffer, 0).unwrap();
        });
    });
}

criterion_group!(benches, matcher_benchmark, resolve_benchmark, request_parse_benchmark);
criterion_main!(benches);
