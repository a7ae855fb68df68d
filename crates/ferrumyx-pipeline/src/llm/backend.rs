//! Pluggable chat LLM backend (§9 "Polymorphic LLM backend"). Two concrete
//! backends are required: a hosted chat-completion API and a local
//! OpenAI-compatible server (e.g. LM Studio). Both expose the same
//! `complete` contract so the rest of the pipeline never branches on which
//! one is in use.

use async_trait::async_trait;
use ferrumyx_common::error::FerrumyxError;

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String, FerrumyxError>;
    fn is_local(&self) -> bool;
    fn model_id(&self) -> &str;
}

/// A local OpenAI-compatible server (LM Studio, Ollama's `/v1` surface, etc).
pub struct LocalBackend {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl LocalBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmBackend for LocalBackend {
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String, FerrumyxError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| FerrumyxError::LlmTransient(e.to_string()))?;

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| FerrumyxError::LlmTransient(e.to_string()))?;

        Ok(json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string())
    }

    fn is_local(&self) -> bool {
        true
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// A hosted chat-completion API reached over HTTPS with bearer auth.
pub struct HostedBackend {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl HostedBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmBackend for HostedBackend {
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String, FerrumyxError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| FerrumyxError::LlmTransient(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(FerrumyxError::LlmTransient(format!(
                "hosted LLM returned status {}",
                resp.status()
            )));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| FerrumyxError::LlmTransient(e.to_string()))?;

        Ok(json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string())
    }

    fn is_local(&self) -> bool {
        false
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
