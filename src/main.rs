use axum::{
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde::Serialize;
use terabox_streamer_rust::{
    config::AppConfig, logging, server::handlers, server::handlers::system::run_local_scan,
    AppState,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 先加载配置，再初始化日志（必须保持 _log_guard 存活）
    let config = AppConfig::load_or_default("config/app.toml").await;
    let _log_guard = logging::init_logging(&config.log);

    info!("TeraBox Streamer Rust v1.2.0 启动中...");

    // 创建应用状态（目录存储、列表客户端、鉴权解析器、解析队列）
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app_state = AppState::new(config)?;
    info!("应用状态初始化完成");

    // 启动时核对一次本地文件，缺失的标记为不可播放
    match run_local_scan(&app_state.catalog) {
        Ok(result) => info!(
            "本地文件核对完成: 检查 {} 行, 修正 {} 行",
            result.checked, result.updated
        ),
        Err(e) => tracing::warn!("本地文件核对失败: {}", e),
    }

    // 配置中间件层
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http()) // HTTP 请求日志
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // API 路由
    let api_routes = Router::new()
        // 容器API
        .route("/containers", post(handlers::create_container))
        .route("/containers", get(handlers::list_containers))
        .route("/containers/:id", get(handlers::get_container))
        .route("/containers/:id", patch(handlers::rename_container))
        .route("/containers/:id", delete(handlers::delete_container))
        .route("/containers/:id/refetch", post(handlers::refetch_container))
        .route("/containers/:id/files", get(handlers::container_files))
        .route("/containers/:id/files", post(handlers::add_container_files))
        // 预览API
        .route("/preview", post(handlers::preview_share))
        // 直链解析API
        .route("/resolve/status", get(handlers::resolve_queue_status))
        .route("/resolve/stale/:container_id", get(handlers::resolve_staleness))
        .route("/resolve/:container_id", post(handlers::resolve_container))
        // 流播放API
        .route("/stream/:file_id", get(handlers::stream_file))
        // 播放进度API
        .route("/files/:file_id/progress", post(handlers::update_progress))
        // 设置与会话API
        .route("/settings", get(handlers::get_settings))
        .route("/settings", put(handlers::update_settings))
        .route("/auth/status", get(handlers::auth_status))
        .route("/auth/save", post(handlers::save_auth))
        // 系统API
        .route("/system/scan-local", get(handlers::scan_local))
        .with_state(app_state.clone());

    // 健康检查响应结构
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
        service: String,
    }

    // 健康检查处理器
    async fn health_check() -> Json<HealthResponse> {
        Json(HealthResponse {
            status: "ok".to_string(),
            service: "terabox-streamer-rust".to_string(),
        })
    }

    // 构建完整应用
    let app = Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(middleware);

    // 启动服务器
    info!("服务器启动在: http://{}", addr);
    info!("API 基础路径: http://{}/api/v1", addr);
    info!("健康检查: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server = axum::serve(listener, app);

    // 监听关闭信号，支持优雅关闭
    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("服务器错误: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("收到 Ctrl+C，开始优雅关闭...");
        }
    }

    info!("正在停止解析队列...");
    app_state.resolver_queue.shutdown();
    info!("应用已安全退出");

    Ok(())
}
