//! Cloud transcription (`OpenAI` Whisper, Deepgram)

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::Transcriber;
use crate::voice::capture::pcm_to_wav;
use crate::{Error, Result};

/// Response from `OpenAI` Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

#[derive(Clone, Copy, Debug)]
enum Provider {
    Whisper,
    Deepgram,
}

const WHISPER_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
const DEEPGRAM_URL: &str = "https://api.deepgram.com/v1/listen";

/// Transcribes segments through a hosted API
pub struct CloudTranscriber {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    provider: Provider,
    endpoint: String,
}

impl CloudTranscriber {
    /// `OpenAI` Whisper
    ///
    /// `client` should come from [`crate::http::client`] so a stalled
    /// request gives up.
    #[must_use]
    pub fn whisper(client: reqwest::Client, api_key: SecretString, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
            provider: Provider::Whisper,
            endpoint: WHISPER_URL.to_string(),
        }
    }

    /// Deepgram
    #[must_use]
    pub fn deepgram(client: reqwest::Client, api_key: SecretString, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
            provider: Provider::Deepgram,
            endpoint: DEEPGRAM_URL.to_string(),
        }
    }

    /// Send requests somewhere other than the provider's public API
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn transcribe_whisper(&self, wav: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = wav.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(transient)?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(transient)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::BackendTransient(format!(
                "Whisper API error {status}: {body}"
            )));
        }

        let result: WhisperResponse = response.json().await.map_err(transient)?;
        Ok(result.text)
    }

    async fn transcribe_deepgram(&self, wav: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = wav.len(), "starting Deepgram transcription");

        let url = format!("{}?model={}&punctuate=true", self.endpoint, self.model);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Token {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "audio/wav")
            .body(wav)
            .send()
            .await
            .map_err(transient)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::BackendTransient(format!(
                "Deepgram API error {status}: {body}"
            )));
        }

        let result: DeepgramResponse = response.json().await.map_err(transient)?;
        Ok(result
            .results
            .channels
            .into_iter()
            .next()
            .and_then(|c| c.alternatives.into_iter().next())
            .map(|a| a.transcript)
            .unwrap_or_default())
    }
}

#[async_trait]
impl Transcriber for CloudTranscriber {
    async fn transcribe(&self, pcm: &[i16], sample_rate: u32) -> Result<String> {
        let wav = pcm_to_wav(pcm, sample_rate)?;
        let text = match self.provider {
            Provider::Whisper => self.transcribe_whisper(wav).await?,
            Provider::Deepgram => self.transcribe_deepgram(wav).await?,
        };
        tracing::info!(transcript = %text, "transcription complete");
        Ok(text)
    }

    fn name(&self) -> &'static str {
        match self.provider {
            Provider::Whisper => "cloud-whisper",
            Provider::Deepgram => "cloud-deepgram",
        }
    }
}

/// Network and decode failures only cost this cycle
fn transient(e: reqwest::Error) -> Error {
    Error::BackendTransient(e.to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    /// Address of a server that accepts connections and never answers
    async fn silent_server() -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        addr
    }

    fn quick_client() -> reqwest::Client {
        crate::http::client(Duration::from_millis(200)).unwrap()
    }

    #[tokio::test]
    async fn test_stalled_whisper_request_is_transient() {
        let addr = silent_server().await;
        let transcriber =
            CloudTranscriber::whisper(quick_client(), SecretString::from("key"), "whisper-1".into())
                .with_endpoint(format!("http://{addr}/v1/audio/transcriptions"));

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            transcriber.transcribe(&[0; 1600], 16_000),
        )
        .await
        .expect("transcription should give up on its own");

        assert!(matches!(result, Err(Error::BackendTransient(_))));
    }

    #[tokio::test]
    async fn test_stalled_deepgram_request_is_transient() {
        let addr = silent_server().await;
        let transcriber =
            CloudTranscriber::deepgram(quick_client(), SecretString::from("key"), "nova-2".into())
                .with_endpoint(format!("http://{addr}/v1/listen"));

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            transcriber.transcribe(&[0; 1600], 16_000),
        )
        .await
        .expect("transcription should give up on its own");

        assert!(matches!(result, Err(Error::BackendTransient(_))));
    }
}
