use crate::error::ExtractError;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// 应用配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ocr: OcrConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Document AI 配置
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub project_id: String,
    pub processor_id: String,
    pub location: String,
    /// 服务账号密钥文件 (JSON)
    pub service_key_path: PathBuf,
    pub endpoint: String,
}

impl OcrConfig {
    /// 处理器资源路径
    pub fn processor_name(&self) -> String {
        format!(
            "projects/{}/locations/{}/processors/{}",
            self.project_id, self.location, self.processor_id
        )
    }
}

#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
}

// api_key 不能出现在日志里
impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// 扁平的环境变量视图, key 已被 config 转成小写
#[derive(Debug, Deserialize)]
struct Settings {
    #[serde(default = "default_host")]
    server_host: String,
    #[serde(default = "default_port")]
    server_port: u16,

    google_doc_ai_project: String,
    google_doc_ai_id: String,
    #[serde(default = "default_location")]
    google_doc_ai_location: String,
    google_service_key_path: PathBuf,
    google_doc_ai_endpoint: Option<String>,

    openai_api_key: String,
    #[serde(default = "default_model")]
    openai_model: String,
    #[serde(default = "default_openai_base_url")]
    openai_base_url: String,
    #[serde(default = "default_max_tokens")]
    openai_max_tokens: u32,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_location() -> String {
    "us".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

impl From<Settings> for AppConfig {
    fn from(s: Settings) -> Self {
        let endpoint = s
            .google_doc_ai_endpoint
            .unwrap_or_else(|| format!("https://{}-documentai.googleapis.com", s.google_doc_ai_location));

        Self {
            server: ServerConfig {
                host: s.server_host,
                port: s.server_port,
            },
            ocr: OcrConfig {
                project_id: s.google_doc_ai_project,
                processor_id: s.google_doc_ai_id,
                location: s.google_doc_ai_location,
                service_key_path: s.google_service_key_path,
                endpoint: endpoint.trim_end_matches('/').to_string(),
            },
            llm: LlmConfig {
                api_key: s.openai_api_key,
                model: s.openai_model,
                base_url: s.openai_base_url.trim_end_matches('/').to_string(),
                max_tokens: s.openai_max_tokens,
            },
        }
    }
}

impl AppConfig {
    /// 从 receipt.toml (可选) 和环境变量加载配置, 环境变量优先
    pub fn from_env() -> Result<Self, ExtractError> {
        Self::load(Environment::default())
    }

    fn load(env: Environment) -> Result<Self, ExtractError> {
        let settings: Settings = Config::builder()
            .add_source(File::with_name("receipt").required(false))
            .add_source(env)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ExtractError::Config(e.to_string()))?;

        Ok(settings.into())
    }
}
