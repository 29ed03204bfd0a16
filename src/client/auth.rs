use crate::error::ExtractError;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// 服务账号密钥文件中用到的字段
#[derive(Deserialize)]
struct KeyFile {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

/// Google 服务账号凭据, 启动时加载一次
#[derive(Clone)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub token_uri: String,
    signing_key: EncodingKey,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, ExtractError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ExtractError::Credentials(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ExtractError> {
        let file: KeyFile = serde_json::from_str(raw)
            .map_err(|e| ExtractError::Credentials(format!("invalid key file: {}", e)))?;
        let signing_key = EncodingKey::from_rsa_pem(file.private_key.as_bytes())
            .map_err(|e| ExtractError::Credentials(format!("invalid private key: {}", e)))?;

        Ok(Self {
            client_email: file.client_email,
            token_uri: file.token_uri.unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            signing_key,
        })
    }

    /// 签名 JWT 断言
    fn assertion(&self) -> Result<String, ExtractError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: &self.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| ExtractError::Credentials(format!("cannot sign assertion: {}", e)))
    }

    /// 用 JWT 断言换取 access token, 每次调用都重新换取
    pub async fn access_token(&self, client: &Client) -> Result<String, ExtractError> {
        let assertion = self.assertion()?;

        let response = client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Upstream {
                service: "Google OAuth",
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}
