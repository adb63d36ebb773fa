use crate::core::config::TtsConfig;
use crate::services::manifest::SpeechRequest;
use crate::services::tts::{TtsClient, WeightKind};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::debug;
use std::time::Duration;
use url::Url;

/// Client for a local GPT-SoVITS API server.
pub struct GptSovitsClient {
    config: TtsConfig,
    base_url: Url,
    client: reqwest::Client,
}

impl GptSovitsClient {
    pub fn new(config: TtsConfig) -> Result<Self> {
        let mut base = config.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .with_context(|| format!("Invalid TTS base_url: {}", config.base_url))?;

        Ok(Self {
            config,
            base_url,
            client: reqwest::Client::new(),
        })
    }

    /// `<base>/set_gpt_weights?weights_path=...`
    pub fn weights_url(&self, kind: WeightKind, path: &str) -> Result<Url> {
        let mut url = self.base_url.join(kind.endpoint())?;
        url.query_pairs_mut().append_pair("weights_path", path);
        Ok(url)
    }

    pub fn tts_url(&self) -> Result<Url> {
        Ok(self.base_url.join("tts")?)
    }
}

/// Rejects bodies too short to be audio; the service sometimes answers 200 with an error blob.
pub fn check_audio(bytes: Vec<u8>, min_bytes: usize) -> Result<Vec<u8>> {
    if bytes.len() < min_bytes {
        bail!(
            "TTS returned {} bytes, expected at least {}",
            bytes.len(),
            min_bytes
        );
    }
    Ok(bytes)
}

#[async_trait]
impl TtsClient for GptSovitsClient {
    async fn set_weights(&self, kind: WeightKind, path: &str) -> Result<()> {
        let url = self.weights_url(kind, path)?;
        debug!("Switching {} weights: {}", kind, url);

        let resp = self
            .client
            .get(url)
            .timeout(Duration::from_secs(self.config.weights_timeout_secs))
            .send()
            .await
            .with_context(|| format!("Failed to switch {} weights to {}", kind, path))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let txt = resp.text().await.unwrap_or_default();
            return Err(anyhow!("{} weight switch failed ({}): {}", kind, status, txt));
        }
        Ok(())
    }

    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>> {
        let resp = self
            .client
            .post(self.tts_url()?)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .json(request)
            .send()
            .await
            .context("TTS request failed")?;

        if resp.status() != reqwest::StatusCode::OK {
            let status = resp.status();
            let txt = resp.text().await.unwrap_or_default();
            return Err(anyhow!("TTS synthesis failed ({}): {}", status, txt));
        }

        let bytes = resp.bytes().await?;
        check_audio(bytes.into(), self.config.min_audio_bytes)
    }
}
