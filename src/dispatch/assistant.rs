//! Remote language-model fallback

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const SYSTEM_PROMPT: &str = "You are JARVIS, a helpful desktop assistant.";
const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Answers commands no intent rule matched
#[async_trait]
pub trait RemoteAssistant: Send + Sync {
    /// Ask the assistant and return its reply text
    ///
    /// # Errors
    ///
    /// Returns `Error::RemoteAssistantUnavailable` if no answer could be had
    async fn ask(&self, text: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// `OpenAI` chat completions
pub struct OpenAiAssistant {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    endpoint: String,
}

impl OpenAiAssistant {
    /// `client` should come from [`crate::http::client`] so a stalled
    /// request gives up.
    #[must_use]
    pub fn new(client: reqwest::Client, api_key: SecretString, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
            endpoint: CHAT_URL.to_string(),
        }
    }

    /// Send requests to a compatible server instead of `OpenAI`
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl RemoteAssistant for OpenAiAssistant {
    async fn ask(&self, text: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
        };

        tracing::debug!(model = %self.model, "asking remote assistant");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteAssistantUnavailable(format!(
                "API error {status}: {body}"
            )));
        }

        let reply: ChatResponse = response.json().await.map_err(unavailable)?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| Error::RemoteAssistantUnavailable("empty response".to_string()))
    }
}

fn unavailable(e: reqwest::Error) -> Error {
    Error::RemoteAssistantUnavailable(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: "tell me a joke",
                },
            ],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["content"], SYSTEM_PROMPT);
        assert_eq!(json["messages"][1]["role"], "user");
    }

    #[test]
    fn test_response_parse() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  Hi there. "}}]}"#;
        let reply: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(reply.choices[0].message.content.as_deref(), Some("  Hi there. "));
    }

    #[tokio::test]
    async fn test_stalled_request_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = crate::http::client(std::time::Duration::from_millis(200)).unwrap();
        let assistant = OpenAiAssistant::new(client, SecretString::from("key"), "gpt-4o-mini".into())
            .with_endpoint(format!("http://{addr}/v1/chat/completions"));

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            assistant.ask("what is the weather"),
        )
        .await
        .expect("request should give up on its own");

        assert!(matches!(result, Err(Error::RemoteAssistantUnavailable(_))));
    }
}
