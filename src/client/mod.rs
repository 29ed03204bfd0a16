pub mod auth;
pub mod document_ai;
pub mod openai;

pub use auth::ServiceAccountKey;
pub use document_ai::DocumentAiClient;
pub use openai::OpenAiClient;

use crate::error::ExtractError;
use reqwest::Client;

/// 创建共享的 HTTP 客户端, 两个上游共用, 初始化后只读
pub fn build_http_client() -> Result<Client, ExtractError> {
    let client = Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}
