pub mod handlers;

pub use handlers::*;

use crate::service::ReceiptExtractor;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// 构建路由, 上传不限制大小
pub fn router(extractor: Arc<ReceiptExtractor>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/extract",
            post(extract_receipt).layer(DefaultBodyLimit::disable()),
        )
        .with_state(extractor)
}
