//! OpenAI-compatible chat completions client

use super::{GenerationOptions, LanguageModel, StructuredSchema};
use crate::error::{Result, WorkerError};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, ResponseFormat, ResponseFormatJsonSchema,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

/// Gemini's OpenAI-compatible endpoint
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Default chat model
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Chat model behind an OpenAI-compatible API
pub struct OpenAiCompatibleModel {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiCompatibleModel {
    /// Create a new client
    ///
    /// # Arguments
    /// * `api_key` - API key for the endpoint
    /// * `api_base` - Base URL of the OpenAI-compatible API
    /// * `model` - Model name (e.g., "gemini-2.0-flash")
    pub fn new(api_key: &str, api_base: &str, model: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }

    /// Create client from LLM_API_KEY, LLM_API_BASE and LLM_MODEL
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("LLM_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| WorkerError::ConfigError("LLM_API_KEY not set".to_string()))?;
        let api_base = std::env::var("LLM_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self::new(&api_key, &api_base, &model))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn chat_request(
        &self,
        prompt: &str,
        options: &GenerationOptions,
        response_format: Option<ResponseFormat>,
    ) -> Result<CreateChatCompletionRequest> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages([ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()?
                .into()])
            .temperature(options.temperature);
        if let Some(tokens) = options.max_output_tokens {
            args.max_tokens(tokens);
        }
        if let Some(format) = response_format {
            args.response_format(format);
        }
        Ok(args.build()?)
    }

    async fn complete(
        &self,
        prompt: &str,
        options: &GenerationOptions,
        response_format: Option<ResponseFormat>,
    ) -> Result<String> {
        debug!("Calling {} with {} chars of prompt", self.model, prompt.len());

        let request = self.chat_request(prompt, options, response_format)?;
        let response = self.client.chat().create(request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| WorkerError::ModelError("Empty response from language model".to_string()))
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleModel {
    async fn generate_text(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        self.complete(prompt, options, None).await
    }

    async fn generate_json(
        &self,
        prompt: &str,
        schema: &StructuredSchema,
        options: &GenerationOptions,
    ) -> Result<Value> {
        let format = ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                description: None,
                name: schema.name.clone(),
                schema: Some(schema.schema.clone()),
                strict: None,
            },
        };

        let text = self.complete(prompt, options, Some(format)).await?;
        serde_json::from_str(strip_code_fence(&text)).map_err(|e| {
            warn!("Model returned invalid JSON for {}: {}", schema.name, e);
            WorkerError::ModelError(format!("Invalid JSON in {} response: {}", schema.name, e))
        })
    }
}

/// Optional model wrapper
///
/// Fails every call with a configuration error if no client is configured
pub struct OptionalLanguageModel {
    model: Option<OpenAiCompatibleModel>,
}

impl OptionalLanguageModel {
    /// Create from environment (no client if LLM_API_KEY is not set)
    pub fn from_env() -> Self {
        Self {
            model: OpenAiCompatibleModel::from_env().ok(),
        }
    }

    /// Create with explicit client
    pub fn with_model(model: OpenAiCompatibleModel) -> Self {
        Self { model: Some(model) }
    }

    /// Create without client
    pub fn none() -> Self {
        Self { model: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.model.is_some()
    }

    fn inner(&self) -> Result<&OpenAiCompatibleModel> {
        self.model
            .as_ref()
            .ok_or_else(|| WorkerError::ConfigError("LLM_API_KEY not set".to_string()))
    }
}

#[async_trait]
impl LanguageModel for OptionalLanguageModel {
    async fn generate_text(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        self.inner()?.generate_text(prompt, options).await
    }

    async fn generate_json(
        &self,
        prompt: &str,
        schema: &StructuredSchema,
        options: &GenerationOptions,
    ) -> Result<Value> {
        self.inner()?.generate_json(prompt, schema, options).await
    }
}

/// Remove a surrounding markdown code fence, if the model added one
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string (e.g. "json") on the opening line
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
