//! SQL 网关服务
//!
//! 提供以下功能：
//! - 数据源连接注册与管理（sqlite / postgres / mysql / api）
//! - sqlite 数据库文件上传
//! - schema、表、字段元数据查询
//! - SQL 执行与查询日志

use anyhow::Context;
use common::config::AppConfig;
use common::utils::load_dotenv;
use gateway::state::AppState;
use gateway::{create_router, SERVICE_NAME};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let loaded = load_dotenv(".env");

    // 初始化日志追踪
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // 加载配置
    let config = AppConfig::load_with_service(SERVICE_NAME);
    info!(
        dotenv_vars = loaded,
        bucket = %config.bucket_dir.display(),
        query_log = config.query_log_enabled,
        "配置已加载"
    );

    // 创建应用状态
    let state = AppState::new(config.clone())
        .await
        .context("初始化应用状态失败")?;
    let store = state.store.clone();

    // 创建路由
    let app = create_router(state);

    // 启动服务
    let addr = config.bind_addr();
    info!(service = SERVICE_NAME, address = %addr, "启动 SQL 网关");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("绑定地址失败: {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("服务运行失败")?;

    store.close().await;
    info!("服务已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "无法监听退出信号");
        std::future::pending::<()>().await;
    }
    info!("收到退出信号，开始关闭");
}
