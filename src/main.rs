use receipt_extractor::{api, AppConfig, ReceiptExtractor};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::from_env()?;
    info!("Starting server with config: {:?}", config);

    // 创建抽取服务 (读取服务账号密钥, 创建 HTTP 客户端)
    let extractor = Arc::new(ReceiptExtractor::from_config(&config)?);
    info!("Receipt extractor created, processor: {}", config.ocr.processor_name());

    let app = api::router(extractor);

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /extract  - multipart field `receipt` (JPEG)");
    info!("  GET  /health");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
