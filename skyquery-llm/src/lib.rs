//! HTTP clients for the chat-completion providers skyquery can talk to.

mod anthropic;
pub mod openai_compatible;
mod provider;

pub use anthropic::{AnthropicClient, AnthropicClientBuilder};
pub use openai_compatible::{OpenAiCompatibleBuilder, OpenAiCompatibleClient};
pub use provider::ProviderKind;
pub use skyquery_core::{Llm, LlmRequest, LlmResponse, Message, Role};

use skyquery_core::SkyqueryError;

pub(crate) fn transport_error(err: reqwest::Error, timeout: std::time::Duration) -> SkyqueryError {
    if err.is_timeout() {
        SkyqueryError::Timeout(timeout)
    } else {
        SkyqueryError::LlmProvider(err.to_string())
    }
}

/// Turns a non-2xx response into a provider error, preferring the provider's
/// own `{"error": {"message": ..}}` text over the bare status line.
pub(crate) async fn status_error(response: reqwest::Response) -> SkyqueryError {
    #[derive(serde::Deserialize)]
    struct Envelope {
        error: Detail,
    }
    #[derive(serde::Deserialize)]
    struct Detail {
        message: String,
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Envelope>(&body)
        .map(|envelope| envelope.error.message)
        .unwrap_or(body);
    SkyqueryError::LlmProvider(format!("{status}: {message}"))
}
