//! Outbound client for the fallback intent classifier (an Ollama-style
//! `/api/generate` endpoint returning strict JSON).

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;

use sakan_agent::classifier::{ClassifierRequest, ClassifierResponse, FallbackClassifier};
use sakan_core::config::ClassifierConfig;

const SYSTEM_PROMPT: &str = "\
You are an intent classifier for an Egyptian real-estate assistant. \
Users write in English, Egyptian Arabic, or a mix. \
Respond with one JSON object and nothing else:\n\
{\"intent\": \"...\", \"entities\": {...}, \"missing_slots\": [...], \"confidence\": 0.0}\n\
intent must be one of: search_projects, filter_units, project_details, \
compare_projects, schedule_visit, budget_check, general_question.\n\
entities may only use the keys: budget_min, budget_max, location_area, \
unit_type, bedrooms, payment_plan. Omit anything you are not sure about.";

pub struct OllamaClassifier {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateEnvelope {
    response: String,
}

impl OllamaClassifier {
    pub fn new(config: &ClassifierConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building classifier http client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.as_ref().map(|key| key.expose_secret().to_string()),
        })
    }

    fn prompt(request: &ClassifierRequest) -> String {
        let mut prompt = format!("{SYSTEM_PROMPT}\n\nCurrent filters: {}\n", request.state_summary);
        if !request.recent_turns.is_empty() {
            prompt.push_str("Recent conversation:\n");
            for turn in &request.recent_turns {
                prompt.push_str(turn);
                prompt.push('\n');
            }
        }
        prompt.push_str(&format!("\nUser message: {}\n", request.text));
        prompt
    }
}

#[async_trait]
impl FallbackClassifier for OllamaClassifier {
    async fn classify(&self, request: &ClassifierRequest) -> anyhow::Result<ClassifierResponse> {
        let body = json!({
            "model": self.model,
            "prompt": Self::prompt(request),
            "stream": false,
            "format": "json",
        });

        let mut call = self.http.post(format!("{}/api/generate", self.base_url)).json(&body);
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let envelope: GenerateEnvelope = call
            .send()
            .await
            .context("classifier request failed")?
            .error_for_status()
            .context("classifier returned an error status")?
            .json()
            .await
            .context("classifier envelope was not valid JSON")?;

        serde_json::from_str(&envelope.response)
            .context("classifier response body was not the expected JSON object")
    }
}
