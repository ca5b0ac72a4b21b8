// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 文件网关
//!
//! 基于 Tokio 运行时的多线程文件上传/下载服务。
//! 启动流程：
//! - 初始化 log4rs 日志
//! - 读取 TOML 配置并应用环境变量覆盖
//! - 构建存储层、控制器与路由表
//! - 启动监听循环与后台管理控制台（CLI 指令交互）

use std::{
    process,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use filegate::{
    config::Config,
    controller::{FileController, FileService},
    routes::initialize_routes,
    DiskStore, Router, Server,
};
use log::{error, info};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    runtime::Builder,
    sync::Notify,
};

fn main() {
    // 1. 日志系统通过外部 YAML 配置级别与输出目的地
    if let Err(e) = log4rs::init_file("config/log4rs.yaml", Default::default()) {
        eprintln!("无法初始化日志系统：{}", e);
        process::exit(1);
    }

    // 2. 配置加载：文件 -> 环境变量 -> 校验
    let config = match Config::from_toml("config/development.toml")
        .and_then(Config::apply_env)
        .and_then(Config::validate)
    {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };
    info!("配置文件已载入");
    info!(
        "存储目录：{}/{}，对外地址：{}",
        config.storage_root(),
        config.bucket(),
        config.public_url()
    );

    // 3. 根据配置分配工作线程数
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建Tokio运行时：{}", e);
            process::exit(1);
        }
    };

    runtime.block_on(serve(config));
}

async fn serve(config: Config) {
    let store = Arc::new(DiskStore::new(
        config.storage_root(),
        config.bucket(),
        config.public_url(),
        config.cache_size(),
        config.cache_threshold(),
    ));
    let controller = Arc::new(FileController::new(FileService::new(store)));
    let mut router = Router::new();
    initialize_routes(&mut router, controller, &config);

    let address = format!("{}:{}", config.host(), config.port());
    let server = match Server::bind(&address, router, config.compression()).await {
        Ok(server) => server,
        Err(e) => {
            error!("无法绑定地址：{}，错误：{}", address, e);
            process::exit(1);
        }
    };
    info!("服务端将在{}上监听Socket连接", address);

    let shutdown = Arc::new(Notify::new());
    tokio::spawn(console(Arc::clone(&shutdown), server.active_connections()));

    server.run_until(async move { shutdown.notified().await }).await;
    info!("服务端已停止");
}

/// 后台管理控制台，不阻塞监听循环
async fn console(shutdown: Arc<Notify>, active_connections: Arc<AtomicUsize>) {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut input = String::new();
    loop {
        input.clear();
        match reader.read_line(&mut input).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        match input.trim() {
            "stop" => {
                println!("停机指令已激活，服务器将停止接受新连接...");
                shutdown.notify_one();
                break;
            }
            "help" => {
                println!("== Filegate Help ==");
                println!("stop   - 发出停机信号");
                println!("status - 查看当前服务器运行状态");
                println!("help   - 显示此帮助信息");
                println!("===================");
            }
            "status" => {
                println!("== Filegate 状态 ==");
                println!("当前活跃连接数: {}", active_connections.load(Ordering::SeqCst));
                println!("===================");
            }
            "" => {}
            cmd => println!("无效的命令：{}", cmd),
        }
    }
}
