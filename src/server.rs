// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 连接层
//!
//! 监听 TCP 端口，为每个连接派生一个任务：读取并解析请求头，
//! 把剩余的字节流包装成 `Body`，交给路由分发，最后写回响应并关闭连接。
//!
//! 路由或处理函数返回的任何 `Err` 都在这里被转换为 `500 {"error": ...}`。

use std::{
    future::Future,
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Instant,
};

use bytes::Bytes;
use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
};

use crate::{
    context::RequestContext,
    exception::Exception,
    param::{HEADER_TERMINATOR, MAX_HEADER_SIZE},
    request::{Body, Request},
    response::Response,
    router::Router,
    util::find_subsequence,
};

pub struct Server {
    listener: TcpListener,
    router: Arc<Router>,
    compression: bool,
    active_connections: Arc<AtomicUsize>,
}

impl Server {
    /// 绑定监听地址。路由表在此之后不再改变。
    pub async fn bind(addr: &str, router: Router, compression: bool) -> Result<Self, Exception> {
        let listener = TcpListener::bind(addr).await?;
        info!("端口绑定完成：{}", addr);
        Ok(Self {
            listener,
            router: Arc::new(router),
            compression,
            active_connections: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Exception> {
        Ok(self.listener.local_addr()?)
    }

    /// 当前活跃连接数的句柄，供管理控制台查询
    pub fn active_connections(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.active_connections)
    }

    /// 持续接受连接，直到 `shutdown` 完成
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut id: u128 = 0;
        loop {
            let (stream, addr) = tokio::select! {
                _ = &mut shutdown => {
                    info!("主循环接收到停机指令，正在退出...");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("接受连接失败：{}", e);
                        continue;
                    }
                },
            };
            debug!("[ID{}]TCP连接已建立：{}", id, addr);

            let router = Arc::clone(&self.router);
            let active = Arc::clone(&self.active_connections);
            let compression = self.compression;
            tokio::spawn(async move {
                active.fetch_add(1, Ordering::SeqCst);
                handle_connection(stream, id, router, compression).await;
                active.fetch_sub(1, Ordering::SeqCst);
            });
            id += 1;
        }
    }
}

/// 读取请求头，返回头部字节（不含空行）与已经多读到的请求体前缀
async fn read_head<R>(reader: &mut R, id: u128) -> Result<Option<(Vec<u8>, Bytes)>, Exception>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(n) => n,
            Err(e) => {
                error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
                return Ok(None);
            }
        };
        if n == 0 {
            if !buffer.is_empty() {
                debug!("[ID{}]请求头不完整，连接已关闭", id);
            }
            return Ok(None);
        }
        // 终止符可能跨越两次读取
        let from = buffer.len().saturating_sub(HEADER_TERMINATOR.len() - 1);
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_subsequence(&buffer, HEADER_TERMINATOR, from) {
            if pos > MAX_HEADER_SIZE {
                return Err(Exception::HeaderTooLarge);
            }
            let rest = Bytes::copy_from_slice(&buffer[pos + HEADER_TERMINATOR.len()..]);
            buffer.truncate(pos);
            return Ok(Some((buffer, rest)));
        }
        if buffer.len() > MAX_HEADER_SIZE {
            return Err(Exception::HeaderTooLarge);
        }
    }
}

/// # 连接处理器
///
/// 负责单个连接的完整生命周期。每个连接只处理一个请求，响应带 `Connection: close`。
pub async fn handle_connection<S>(stream: S, id: u128, router: Arc<Router>, compression: bool)
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);

    let (head, rest) = match read_head(&mut reader, id).await {
        Ok(Some(head)) => head,
        Ok(None) => return,
        Err(e) => {
            warn!("[ID{}]{}，上限{}字节", id, e, MAX_HEADER_SIZE);
            write_response(&mut writer, &Response::plain(431), id).await;
            return;
        }
    };
    debug!("[ID{}]HTTP请求头接收完毕", id);
    let start_time = Instant::now();

    let request = match Request::try_from(&head, id) {
        Ok(request) => request,
        Err(e) => {
            error!("[ID{}]解析HTTP请求失败: {}", id, e);
            write_response(&mut writer, &Response::plain(400), id).await;
            return;
        }
    };
    debug!("[ID{}]成功解析HTTP请求", id);

    let version = request.version().clone();
    let method = request.method().clone();
    let target = request.target().to_string();
    let user_agent = request.user_agent().to_string();
    let accept_encoding = request.accept_encoding().clone();

    let body = Body::from_stream(rest, reader, request.content_length().unwrap_or(0));
    let mut response = match RequestContext::new(id, request, body) {
        Ok(ctx) => match router.dispatch(ctx).await {
            Ok(response) => response,
            Err(e) => {
                error!("[ID{}]处理请求时发生异常: {}", id, e);
                Response::error(500, &e.to_string())
            }
        },
        Err(e) => {
            warn!("[ID{}]请求的路径：{} 非法，返回400", id, target);
            Response::error(400, &e.to_string())
        }
    };

    if compression {
        response.encode(&accept_encoding, id);
    }
    debug!(
        "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
        id,
        start_time.elapsed().as_millis()
    );

    info!(
        "[ID{}] {}, {}, {}, {}, {}, {}",
        id,
        version,
        target,
        method,
        response.status_code(),
        response.information(),
        user_agent,
    );

    write_response(&mut writer, &response, id).await;
}

async fn write_response<W>(writer: &mut W, response: &Response, id: u128)
where
    W: AsyncWrite + Unpin,
{
    let bytes = response.as_bytes();
    debug!("[ID{}]发送响应，长度: {}", id, bytes.len());
    if let Err(e) = writer.write_all(&bytes).await {
        error!("[ID{}]发送响应失败: {}", id, e);
        return;
    }
    if let Err(e) = writer.flush().await {
        debug!("[ID{}]刷新响应缓冲失败: {}", id, e);
    }
    if let Err(e) = writer.shutdown().await {
        debug!("[ID{}]关闭写端失败: {}", id, e);
    }
}
