use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// 请求处理过程中的所有错误
///
/// 只有客户端输入错误会把原因返回给调用方, 上游服务失败统一返回 500,
/// 具体原因只写日志。
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── 客户端错误 ───────────────────────────────
    #[error("No receipt file provided")]
    MissingFile,

    #[error("Malformed multipart request: {0}")]
    Multipart(String),

    // ── 启动期错误 ───────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Service account credentials error: {0}")]
    Credentials(String),

    // ── 上游服务错误 ─────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Language model refused the request: {0}")]
    Refusal(String),

    #[error("Structured output does not match the receipt schema: {0}")]
    SchemaMismatch(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExtractError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ExtractError::MissingFile | ExtractError::Multipart(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ExtractError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_client_error() {
            self.to_string()
        } else {
            tracing::error!("Receipt extraction failed: {}", self);
            "Internal Server Error".to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
