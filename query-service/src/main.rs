use common::config::{load_dotenv, AppConfig};
use query_service::{build_app, AppState, SERVICE_NAME};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PORT: u16 = 8082;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 优先加载 .env 文件
    load_dotenv();

    // 初始化日志追踪
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // 加载配置
    let mut config = AppConfig::load_with_service(SERVICE_NAME);
    if std::env::var("SERVER_PORT").is_err() {
        config.port = DEFAULT_PORT;
    }

    // 创建应用状态（文档存储、变量缓存、查询执行器）
    let state = AppState::new(config.clone()).await?;

    let app = build_app(state);

    // 启动服务
    let addr = format!("{}:{}", config.host, config.port);
    info!(service = SERVICE_NAME, address = %addr, runner = %config.runner_url, "启动服务");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
