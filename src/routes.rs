//! 文件网关的路由表

use std::sync::Arc;

use log::info;

use crate::{
    config::Config,
    context::RequestContext,
    controller::FileController,
    middleware::{AccessLog, ContentTypeValidator, MultipartMiddleware},
    pipeline::Middleware,
    router::Router,
};

/// 注册 `/files` 相关的全部路由
///
/// | 方法   | 路径          | 中间件                   |
/// |--------|---------------|--------------------------|
/// | POST   | `/files`      | multipart、类型校验       |
/// | PUT    | `/files/:key` | multipart、类型校验       |
/// | GET    | `/files/:key` |                          |
/// | DELETE | `/files/:key` |                          |
pub fn initialize_routes(router: &mut Router, controller: Arc<FileController>, config: &Config) {
    router.add_global_middleware(Arc::new(AccessLog));

    let multipart: Arc<dyn Middleware> = Arc::new(MultipartMiddleware::new(config.max_body_size()));
    let validator: Arc<dyn Middleware> =
        Arc::new(ContentTypeValidator::new(config.allowed_content_types()));
    let upload_stages = vec![Arc::clone(&multipart), Arc::clone(&validator)];

    let c = Arc::clone(&controller);
    router.post(
        "/files",
        move |ctx: RequestContext| {
            let c = Arc::clone(&c);
            async move { c.upload(ctx).await }
        },
        upload_stages.clone(),
    );

    let c = Arc::clone(&controller);
    router.put(
        "/files/:key",
        move |ctx: RequestContext| {
            let c = Arc::clone(&c);
            async move { c.replace(ctx).await }
        },
        upload_stages,
    );

    let c = Arc::clone(&controller);
    router.get(
        "/files/:key",
        move |ctx: RequestContext| {
            let c = Arc::clone(&c);
            async move { c.retrieve(ctx).await }
        },
        vec![],
    );

    let c = controller;
    router.delete(
        "/files/:key",
        move |ctx: RequestContext| {
            let c = Arc::clone(&c);
            async move { c.delete(ctx).await }
        },
        vec![],
    );

    info!("路由注册完成，共{}条", router.route_count());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        controller::FileService,
        param::HttpRequestMethod,
        store::MockFileStore,
    };

    #[test]
    fn test_routes_registered() {
        let controller = Arc::new(FileController::new(FileService::new(Arc::new(
            MockFileStore::new(),
        ))));
        let mut router = Router::new();
        initialize_routes(&mut router, controller, &Config::new());

        assert_eq!(router.route_count(), 4);
        assert!(router.resolve(&HttpRequestMethod::Post, "/files").is_some());
        for method in [
            HttpRequestMethod::Put,
            HttpRequestMethod::Get,
            HttpRequestMethod::Delete,
        ] {
            let (route, params) = router.resolve(&method, "/files/a.png").unwrap();
            assert_eq!(route.pattern(), "/files/:key");
            assert_eq!(params.get("key"), Some("a.png"));
        }
        assert!(router.resolve(&HttpRequestMethod::Get, "/files").is_none());
    }
}
