//! LLM chat clients and the provider resolution policy.
//!
//! Responses are normalized to [`ChatResponse`] at the service boundary so
//! stage code never inspects raw provider payloads.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::constants::{LlmProvider, SQL_GENERATION_GOOGLE_MODEL};
use crate::error::{AgentError, Result};

/// Normalized chat completion.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub text: String,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<ChatResponse>;

    /// Model identifier recorded in generation history.
    fn model_name(&self) -> &str;
}

/// Factory seam for obtaining chat models. Stages depend on this trait so
/// tests can substitute canned models.
pub trait ChatModelFactory: Send + Sync {
    fn create(&self, temperature: f32, provider: Option<LlmProvider>) -> Result<Box<dyn ChatModel>>;

    /// Model used for SQL generation; prefers a higher-capability variant
    /// when its credentials are available.
    fn create_for_sql(&self) -> Result<Box<dyn ChatModel>>;
}

/// Chat model backed by a provider REST API.
pub struct HttpChatModel {
    provider: LlmProvider,
    model: String,
    api_key: String,
    temperature: f32,
    client: reqwest::Client,
}

impl HttpChatModel {
    pub fn new(provider: LlmProvider, model: String, api_key: String, temperature: f32) -> Self {
        Self {
            provider,
            model,
            api_key,
            temperature,
            client: reqwest::Client::new(),
        }
    }

    async fn invoke_google(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {"temperature": self.temperature},
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::Llm(format!("Google API call failed: {}", e)))?;

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AgentError::Llm(format!("Failed to parse Google response: {}", e)))?;

        payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AgentError::Llm("No content in Google response".to_string()))
    }

    async fn invoke_openai(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::Llm(format!("OpenAI API call failed: {}", e)))?;

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AgentError::Llm(format!("Failed to parse OpenAI response: {}", e)))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AgentError::Llm("No content in OpenAI response".to_string()))
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn invoke(&self, prompt: &str) -> Result<ChatResponse> {
        let text = match self.provider {
            LlmProvider::Google => self.invoke_google(prompt).await?,
            LlmProvider::Openai => self.invoke_openai(prompt).await?,
        };
        Ok(ChatResponse { text })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Factory for creating chat models with smart provider fallback.
pub struct LlmClientFactory {
    settings: Arc<Settings>,
}

impl LlmClientFactory {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Resolution order: explicit request > configured preference when its
    /// credential is present > whichever credential is present > configured
    /// preference regardless.
    fn resolve_provider(&self, explicit: Option<LlmProvider>) -> LlmProvider {
        if let Some(provider) = explicit {
            return provider;
        }
        let preferred = self.settings.default_llm_provider;

        if preferred == LlmProvider::Google && self.settings.google_api_key.is_some() {
            return LlmProvider::Google;
        }
        if preferred == LlmProvider::Openai && self.settings.openai_api_key.is_some() {
            return LlmProvider::Openai;
        }

        if self.settings.google_api_key.is_some() {
            return LlmProvider::Google;
        }
        if self.settings.openai_api_key.is_some() {
            return LlmProvider::Openai;
        }

        preferred
    }

    fn google_model(&self, temperature: f32, key: &str) -> Box<dyn ChatModel> {
        Box::new(HttpChatModel::new(
            LlmProvider::Google,
            self.settings.google_model_name.clone(),
            key.to_string(),
            temperature,
        ))
    }

    fn openai_model(&self, temperature: f32, key: &str) -> Box<dyn ChatModel> {
        Box::new(HttpChatModel::new(
            LlmProvider::Openai,
            self.settings.openai_model_name.clone(),
            key.to_string(),
            temperature,
        ))
    }
}

impl ChatModelFactory for LlmClientFactory {
    fn create(&self, temperature: f32, provider: Option<LlmProvider>) -> Result<Box<dyn ChatModel>> {
        let resolved = self.resolve_provider(provider);

        match resolved {
            LlmProvider::Google => match &self.settings.google_api_key {
                Some(key) => Ok(self.google_model(temperature, key)),
                None => match &self.settings.openai_api_key {
                    Some(key) => Ok(self.openai_model(temperature, key)),
                    None => Err(AgentError::CredentialsMissing(
                        "GOOGLE_API_KEY is required for the Google LLM provider".to_string(),
                    )),
                },
            },
            LlmProvider::Openai => match &self.settings.openai_api_key {
                Some(key) => Ok(self.openai_model(temperature, key)),
                None => match &self.settings.google_api_key {
                    Some(key) => Ok(self.google_model(temperature, key)),
                    None => Err(AgentError::CredentialsMissing(
                        "OPENAI_API_KEY is required for the OpenAI provider".to_string(),
                    )),
                },
            },
        }
    }

    fn create_for_sql(&self) -> Result<Box<dyn ChatModel>> {
        if let Some(key) = &self.settings.google_api_key {
            debug!(model = SQL_GENERATION_GOOGLE_MODEL, "using pro model for SQL generation");
            return Ok(Box::new(HttpChatModel::new(
                LlmProvider::Google,
                SQL_GENERATION_GOOGLE_MODEL.to_string(),
                key.clone(),
                0.0,
            )));
        }
        self.create(0.0, None)
    }
}

/// Invoke the primary provider and fall back to OpenAI on failure.
///
/// The attempt list is explicit: resolved primary first, then OpenAI. A
/// credential error on the fallback is returned as-is so callers can emit
/// their fixed degradation text.
pub async fn invoke_with_fallback(
    factory: &dyn ChatModelFactory,
    temperature: f32,
    prompt: &str,
) -> Result<ChatResponse> {
    let attempts = [None, Some(LlmProvider::Openai)];
    let mut last_error = AgentError::Llm("no LLM provider attempted".to_string());

    for provider in attempts {
        match factory.create(temperature, provider) {
            Ok(model) => match model.invoke(prompt).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!(?provider, error = %e, "LLM provider failed");
                    last_error = e;
                }
            },
            Err(e) => {
                warn!(?provider, error = %e, "LLM provider unavailable");
                if e.is_credentials() && provider.is_some() {
                    return Err(e);
                }
                last_error = e;
            }
        }
    }

    Err(last_error)
}
