use std::fmt;
use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use skyquery_core::{Llm, LlmRequest, LlmResponse, Message, Role, SkyqueryError};

use crate::{status_error, transport_error, ProviderKind};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Client for the Anthropic Messages API.
#[derive(Clone)]
pub struct AnthropicClient {
    http: Client,
    base_url: Url,
    api_key: SecretString,
    default_model: String,
    timeout: Duration,
}

impl fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .field("default_model", &self.default_model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AnthropicClient {
    pub fn builder() -> AnthropicClientBuilder {
        AnthropicClientBuilder::default()
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    fn messages_url(&self) -> Result<Url, SkyqueryError> {
        self.base_url
            .join("v1/messages")
            .map_err(|err| SkyqueryError::InvalidConfig(err.to_string()))
    }
}

#[derive(Clone, Default)]
pub struct AnthropicClientBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    default_model: Option<String>,
    timeout: Option<Duration>,
}

impl fmt::Debug for AnthropicClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_some() {
            "<redacted>"
        } else {
            "<none>"
        };
        f.debug_struct("AnthropicClientBuilder")
            .field("base_url", &self.base_url)
            .field("api_key", &api_key)
            .field("default_model", &self.default_model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AnthropicClientBuilder {
    pub fn base_url(mut self, value: impl Into<String>) -> Self {
        self.base_url = Some(value.into());
        self
    }

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

    pub fn build(self) -> Result<AnthropicClient, SkyqueryError> {
        let api_key = self.api_key.ok_or_else(|| {
            SkyqueryError::InvalidConfig("anthropic api_key is required".to_string())
        })?;
        let base_url = parse_base_url(
            self.base_url
                .as_deref()
                .unwrap_or(ProviderKind::Anthropic.default_base_url()),
        )?;
        let timeout = self.timeout.unwrap_or(Duration::from_secs(60));
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SkyqueryError::LlmProvider(err.to_string()))?;

        Ok(AnthropicClient {
            http,
            base_url,
            api_key: SecretString::new(api_key),
            default_model: self
                .default_model
                .unwrap_or_else(|| ProviderKind::Anthropic.default_model().to_string()),
            timeout,
        })
    }
}

/// Parses a base URL so that relative joins keep any path prefix.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, SkyqueryError> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized)
        .map_err(|err| SkyqueryError::InvalidConfig(format!("invalid base url '{raw}': {err}")))
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait::async_trait]
impl Llm for AnthropicClient {
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
        // The Messages API takes the system prompt as a top-level field only.
        let messages = messages
            .into_iter()
            .filter(|message| message.role != Role::System)
            .collect();
        let request = MessagesRequest {
            model,
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature,
            system,
            messages,
        };

        let response = self
            .http
            .post(self.messages_url()?)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|err| transport_error(err, self.timeout))?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|err| SkyqueryError::LlmProvider(err.to_string()))?;

        let content: String = body
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        Ok(LlmResponse { content })
    }
}
