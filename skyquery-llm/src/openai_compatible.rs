//! Client for any provider that speaks OpenAI's chat completions format.

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use skyquery_core::{Llm, LlmRequest, LlmResponse, Message, Role, SkyqueryError};

use crate::anthropic::parse_base_url;
use crate::{status_error, transport_error, ProviderKind};

#[derive(Serialize, Debug, Clone)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub model: Option<String>,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Choice {
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ResponseMessage {
    pub role: String,
    pub content: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    http: Client,
    base_url: Url,
    api_key: Option<SecretString>,
    default_model: String,
    timeout: Duration,
}

impl fmt::Debug for OpenAiCompatibleClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_some() {
            "<redacted>"
        } else {
            "<none>"
        };
        f.debug_struct("OpenAiCompatibleClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &api_key)
            .field("default_model", &self.default_model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiCompatibleClient {
    pub fn builder() -> OpenAiCompatibleBuilder {
        OpenAiCompatibleBuilder::default()
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn set_default_model(&mut self, model: impl Into<String>) {
        self.default_model = model.into();
    }
}

#[derive(Clone, Default)]
pub struct OpenAiCompatibleBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    default_model: Option<String>,
    timeout: Option<Duration>,
}

impl fmt::Debug for OpenAiCompatibleBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_some() {
            "<redacted>"
        } else {
            "<none>"
        };
        f.debug_struct("OpenAiCompatibleBuilder")
            .field("base_url", &self.base_url)
            .field("api_key", &api_key)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl OpenAiCompatibleBuilder {
    pub fn base_url(mut self, value: impl Into<String>) -> Self {
        self.base_url = Some(value.into());
        self
    }

    /// Optional: self-hosted OpenAI-compatible servers often run without auth.
    pub fn api_key(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        self.api_key = if value.trim().is_empty() {
            None
        } else {
            Some(value)
        };
        self
    }

    pub fn api_key_from_env(mut self, var_name: &str) -> Self {
        if let Ok(value) = std::env::var(var_name) {
            self = self.api_key(value);
        }
        self
    }

    pub fn default_model(mut self, value: impl Into<String>) -> Self {
        self.default_model = Some(value.into());
        self
    }

    pub fn timeout(mut self, value: Duration) -> Self {
        self.timeout = Some(value);
        self
    }

    pub fn build(self) -> Result<OpenAiCompatibleClient, SkyqueryError> {
        let base_url = parse_base_url(
            self.base_url
                .as_deref()
                .unwrap_or(ProviderKind::OpenAi.default_base_url()),
        )?;
        let base_is_openai = base_url.host_str() == Some("api.openai.com");
        if base_is_openai && self.api_key.is_none() {
            return Err(SkyqueryError::InvalidConfig(
                "openai api_key is required".to_string(),
            ));
        }
        let timeout = self.timeout.unwrap_or(Duration::from_secs(60));
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SkyqueryError::LlmProvider(err.to_string()))?;

        Ok(OpenAiCompatibleClient {
            http,
            base_url,
            api_key: self.api_key.map(SecretString::new),
            default_model: self
                .default_model
                .unwrap_or_else(|| ProviderKind::OpenAi.default_model().to_string()),
            timeout,
        })
    }
}

#[async_trait::async_trait]
impl Llm for OpenAiCompatibleClient {
    async fn invoke(&self, input: LlmRequest) -> Result<LlmResponse, SkyqueryError> {
        let LlmRequest {
            model,
            system,
            messages,
            max_tokens,
            temperature,
        } = input;
        let model = if model.is_empty() {
            self.default_model.clone()
        } else {
            model
        };
        let mut all_messages = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = system {
            all_messages.push(Message {
                role: Role::System,
                content: system,
            });
        }
        all_messages.extend(messages);

        let request = ChatCompletionRequest {
            model,
            messages: all_messages,
            temperature,
            max_tokens,
            stream: false,
        };
        let url = self
            .base_url
            .join("v1/chat/completions")
            .map_err(|err| SkyqueryError::InvalidConfig(err.to_string()))?;

        let mut builder = self.http.post(url).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }
        let response = builder
            .send()
            .await
            .map_err(|err| transport_error(err, self.timeout))?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| SkyqueryError::LlmProvider(err.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| SkyqueryError::LlmProvider("response contained no choices".to_string()))?;
        Ok(LlmResponse { content })
    }
}
