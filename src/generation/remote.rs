//! Hosted generation via the Hugging Face Inference API

use super::{Generate, GenerationParams};
use crate::config::{GenerationModelConfig, HubConfig};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

pub struct RemoteGenerator {
    client: reqwest::Client,
    url: String,
    model_id: String,
    token: Option<String>,
}

impl RemoteGenerator {
    pub fn new(model: &GenerationModelConfig, hub: &HubConfig, token: Option<&str>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(hub.timeout_secs))
            .build()
            .map_err(|e| Error::generation(&model.remote_model, e))?;

        Ok(Self {
            client,
            url: format!(
                "{}/models/{}",
                hub.inference_endpoint.trim_end_matches('/'),
                model.remote_model
            ),
            model_id: model.remote_model.clone(),
            token: token.map(str::to_string),
        })
    }

    /// Request body for the text-generation task
    fn request_body(prompt: &str, params: &GenerationParams) -> Value {
        let mut parameters = Map::new();
        parameters.insert("max_new_tokens".into(), json!(params.max_new_tokens));
        parameters.insert("return_full_text".into(), json!(false));
        parameters.insert("do_sample".into(), json!(!params.is_greedy()));
        // The endpoint rejects temperature 0; greedy is expressed by do_sample
        if !params.is_greedy() {
            parameters.insert("temperature".into(), json!(params.temperature));
            parameters.insert("seed".into(), json!(params.seed));
            if let Some(top_p) = params.top_p {
                parameters.insert("top_p".into(), json!(top_p));
            }
        }
        if params.repeat_penalty != 1.0 {
            parameters.insert("repetition_penalty".into(), json!(params.repeat_penalty));
        }

        json!({
            "inputs": prompt,
            "parameters": parameters,
            "options": { "wait_for_model": true }
        })
    }

    /// Accepts `[{"generated_text": ..}]` or a bare object
    fn parse_response(&self, body: &Value) -> Result<String> {
        if let Some(message) = body.get("error").and_then(Value::as_str) {
            return Err(Error::generation(&self.model_id, message));
        }
        let first = match body {
            Value::Array(items) => items.first(),
            other => Some(other),
        };
        first
            .and_then(|v| v.get("generated_text"))
            .and_then(Value::as_str)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| Error::generation(&self.model_id, "response has no generated_text"))
    }
}

#[async_trait]
impl Generate for RemoteGenerator {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        debug!(model = %self.model_id, prompt_chars = prompt.len(), "remote generation request");

        let mut request = self.client.post(&self.url).json(&Self::request_body(prompt, params));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::generation(&self.model_id, e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::generation(
                &self.model_id,
                format!("HTTP {}: the token was rejected or lacks access to this model", status),
            ));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::generation(&self.model_id, format!("HTTP {}: {}", status, detail)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::generation(&self.model_id, e))?;
        self.parse_response(&body)
    }

    fn name(&self) -> &str {
        &self.model_id
    }
}
