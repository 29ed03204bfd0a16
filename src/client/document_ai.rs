use super::auth::ServiceAccountKey;
use crate::config::OcrConfig;
use crate::error::ExtractError;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// process 请求体
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest<'a> {
    name: &'a str,
    raw_document: RawDocument<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument<'a> {
    content: String, // base64
    mime_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct ProcessResponse {
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    text: String,
}

/// Google Document AI 客户端
pub struct DocumentAiClient {
    http: Client,
    credentials: ServiceAccountKey,
    processor_name: String,
    url: String,
}

impl DocumentAiClient {
    pub fn new(http: Client, config: &OcrConfig) -> Result<Self, ExtractError> {
        let credentials = ServiceAccountKey::from_file(&config.service_key_path)?;
        Ok(Self::with_credentials(http, config, credentials))
    }

    pub fn with_credentials(http: Client, config: &OcrConfig, credentials: ServiceAccountKey) -> Self {
        let processor_name = config.processor_name();
        let url = format!("{}/v1/{}:process", config.endpoint, processor_name);
        Self {
            http,
            credentials,
            processor_name,
            url,
        }
    }

    pub fn processor_name(&self) -> &str {
        &self.processor_name
    }

    /// 上传原始文档, 返回识别出的全文
    pub async fn process_document(&self, content: &[u8], mime_type: &str) -> Result<String, ExtractError> {
        let token = self.credentials.access_token(&self.http).await?;

        let body = ProcessRequest {
            name: &self.processor_name,
            raw_document: RawDocument {
                content: BASE64_STANDARD.encode(content),
                mime_type,
            },
        };

        tracing::debug!(processor = %self.processor_name, bytes = content.len(), "Sending document to Document AI");

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Upstream {
                service: "Document AI",
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ProcessResponse = response.json().await?;
        Ok(parsed.document.map(|d| d.text).unwrap_or_default())
    }
}
