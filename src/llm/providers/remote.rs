use crate::config::LlmConfig;
use crate::llm::{CompletionService, Prompt, ServiceError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible chat completions endpoint.
pub struct RemoteLlmProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct PromptRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct PromptResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl RemoteLlmProvider {
    pub fn new(config: &LlmConfig, api_key: Option<String>) -> Result<Self, ServiceError> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let api_key = api_key.ok_or_else(|| {
            ServiceError::ConfigError("API key is required for remote LLM provider".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ServiceError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn prepare_request(&self, prompt: &Prompt) -> PromptRequest {
        PromptRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: prompt.system.clone(),
                },
                Message {
                    role: "user".to_string(),
                    content: prompt.user.clone(),
                },
            ],
            temperature: self.temperature,
            max_tokens: 2000,
        }
    }
}

fn parse_response(body: &str) -> Result<String, ServiceError> {
    let prompt_response: PromptResponse = serde_json::from_str(body)
        .map_err(|e| ServiceError::ResponseError(format!("Failed to parse response: {}", e)))?;

    prompt_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::ResponseError("No choices in response".to_string()))?
        .message
        .content
        .ok_or_else(|| ServiceError::ResponseError("Response message has no content".to_string()))
}

#[async_trait]
impl CompletionService for RemoteLlmProvider {
    async fn complete(&self, prompt: &Prompt) -> Result<String, ServiceError> {
        let request = self.prepare_request(prompt);

        info!("Sending request to {} with model: {}", self.api_url, self.model);

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = match response.text().await {
                Ok(body) => format!(" - Response body: {}", body),
                Err(_) => String::new(),
            };

            error!("API responded with status code: {}{}", status, error_body);
            return Err(ServiceError::ResponseError(format!(
                "API responded with status code: {}{}",
                status, error_body
            )));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| ServiceError::ResponseError(format!("Failed to read response body: {}", e)))?;
        debug!("Raw response: {}", response_text);

        parse_response(&response_text)
    }
}
