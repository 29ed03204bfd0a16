use crate::config::LlmConfig;
use crate::error::ExtractError;
use reqwest::Client;
use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    response_format: ResponseFormat<'a>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: NamedSchema<'a>,
}

#[derive(Serialize)]
struct NamedSchema<'a> {
    name: &'a str,
    strict: bool,
    schema: Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    refusal: Option<String>,
}

/// OpenAI chat completions 客户端 (structured outputs)
pub struct OpenAiClient {
    http: Client,
    config: LlmConfig,
}

impl OpenAiClient {
    pub fn new(http: Client, config: &LlmConfig) -> Self {
        Self {
            http,
            config: config.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// 按 `T` 的 schema 约束模型输出, 并解析为 `T`
    pub async fn parse<T>(&self, system: &str, user: &str) -> Result<T, ExtractError>
    where
        T: JsonSchema + DeserializeOwned,
    {
        let name = T::schema_name();
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            max_tokens: self.config.max_tokens,
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: NamedSchema {
                    name: &name,
                    strict: true,
                    schema: strict_schema::<T>()?,
                },
            },
        };

        tracing::debug!(model = %self.config.model, schema = %name, "Sending structured completion request");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Upstream {
                service: "OpenAI",
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatResponse = response.json().await?;
        parse_first_choice(completion)
    }
}

fn parse_first_choice<T: DeserializeOwned>(completion: ChatResponse) -> Result<T, ExtractError> {
    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ExtractError::SchemaMismatch("completion returned no choices".into()))?;

    if let Some(refusal) = choice.message.refusal {
        return Err(ExtractError::Refusal(refusal));
    }
    if choice.finish_reason.as_deref() == Some("length") {
        return Err(ExtractError::SchemaMismatch(
            "completion was truncated by the token limit".into(),
        ));
    }

    let content = choice
        .message
        .content
        .ok_or_else(|| ExtractError::SchemaMismatch("completion has no content".into()))?;

    serde_json::from_str(&content).map_err(|e| ExtractError::SchemaMismatch(e.to_string()))
}

/// 生成 strict 模式可用的 JSON Schema
///
/// strict 模式要求每个对象都声明 `additionalProperties: false` 且所有属性必填,
/// 并且不接受 `format` 等关键字。
pub fn strict_schema<T: JsonSchema>() -> Result<Value, ExtractError> {
    let mut schema = serde_json::to_value(schema_for!(T))?;
    normalize_schema(&mut schema);
    Ok(schema)
}

fn normalize_schema(node: &mut Value) {
    match node {
        Value::Object(map) => {
            for keyword in ["$schema", "title", "format"] {
                map.remove(keyword);
            }

            let required: Option<Vec<Value>> = match map.get("properties") {
                Some(Value::Object(props)) => Some(props.keys().cloned().map(Value::String).collect()),
                _ => None,
            };
            if let Some(required) = required {
                map.insert("required".into(), Value::Array(required));
                map.insert("additionalProperties".into(), Value::Bool(false));
            }

            // 属性名本身不是关键字, 只处理子 schema
            for key in ["properties", "$defs", "definitions"] {
                if let Some(Value::Object(children)) = map.get_mut(key) {
                    children.values_mut().for_each(normalize_schema);
                }
            }
            for key in ["items", "anyOf", "oneOf", "allOf"] {
                if let Some(child) = map.get_mut(key) {
                    normalize_schema(child);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_schema),
        _ => {}
    }
}
