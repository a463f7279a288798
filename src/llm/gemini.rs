//! Gemini `generateContent` client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::types::{AppError, Result};

use super::client::GenerationClient;

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiClient {
    pub fn new(api_key: String, api_base: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            api_base,
            model,
        }
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base, self.model, self.api_key
        );
        let body = json!({
            "contents": [{
                "parts": [{ "text": prompt }],
            }],
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Generation(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Generation(format!(
                "Gemini generation API returned {}",
                response.status()
            )));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            AppError::Generation(format!("Gemini generation response malformed: {}", e))
        })?;

        let text: String = parsed
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AppError::Generation(
                "Gemini returned an empty completion".into(),
            ));
        }
        Ok(text)
    }
}
