pub mod cache;
pub mod config;
pub mod context;
pub mod controller;
pub mod exception;
pub mod matcher;
pub mod middleware;
pub mod multipart;
pub mod param;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod router;
pub mod routes;
pub mod server;
pub mod store;
pub mod util;

pub use config::Config;
pub use context::RequestContext;
pub use exception::Exception;
pub use matcher::{Params, PathMatcher};
pub use multipart::{FilePart, MultipartParser};
pub use param::{HttpEncoding, HttpRequestMethod, HttpVersion};
pub use pipeline::{Flow, Handler, Middleware};
pub use request::{Body, Request};
pub use response::Response;
pub use router::Router;
pub use server::Server;
pub use store::{DiskStore, FileStore, StoredFile};
