use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::{CompletionOptions, Message, UpstreamConfig};

const BODY_EXCERPT_CHARS: usize = 512;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request timed out")]
    Timeout,
    #[error("transport failure: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("request failed: {status} -> {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("malformed response body: {0}")]
    MalformedBody(String),
    #[error("response contained no choices")]
    NoChoices,
}

impl UpstreamError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err)
        }
    }
}

/**
 * \brief OpenAI 兼容补全接口客户端；内部连接池可跨请求复用。
 */
#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    config: UpstreamConfig,
}

impl CompletionClient {
    /**
     * \brief 按配置构建客户端，整次请求受 timeout_ms 约束。
     */
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(UpstreamError::Client)?;
        Ok(Self { http, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /**
     * \brief 非流式调用，返回首个 choice 的原始文本。
     */
    pub async fn chat_once(
        &self,
        messages: &[Message],
        options: CompletionOptions,
    ) -> Result<String, UpstreamError> {
        let body = request_body(&self.config.model, messages, options);

        let resp = self
            .http
            .post(&self.config.url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status,
                body: excerpt(&text),
            });
        }

        let text = resp.text().await.map_err(UpstreamError::from_reqwest)?;
        let v: Value = serde_json::from_str(&text)
            .map_err(|e| UpstreamError::MalformedBody(format!("{}: {}", e, excerpt(&text))))?;
        extract_openai_content(&v)
    }
}

fn request_body(model: &str, messages: &[Message], options: CompletionOptions) -> Value {
    let mut body = json!({
        "model": model,
        "messages": messages,
        "stream": false
    });
    if let Some(temperature) = options.temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(max_tokens) = options.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    body
}

fn extract_openai_content(v: &Value) -> Result<String, UpstreamError> {
    let choices = v
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| UpstreamError::MalformedBody("missing choices array".to_string()))?;
    let first = choices.first().ok_or(UpstreamError::NoChoices)?;
    first
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| UpstreamError::MalformedBody("choice has no message content".to_string()))
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= BODY_EXCERPT_CHARS {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(BODY_EXCERPT_CHARS).collect();
        out.push('…');
        out
    }
}
