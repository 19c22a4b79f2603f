//! Language model access
//!
//! Handlers talk to a [`LanguageModel`]; structured answers are requested with
//! a JSON schema derived from the Rust output type and decoded back into it.

pub mod openai;
pub mod prompts;
pub mod schema;

use crate::error::{Result, WorkerError};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use openai::{OpenAiCompatibleModel, OptionalLanguageModel, DEFAULT_API_BASE, DEFAULT_MODEL};

/// Sampling options for one model call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_output_tokens: Option<u32>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_output_tokens: None,
        }
    }
}

impl GenerationOptions {
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature,
            ..Default::default()
        }
    }

    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }
}

/// Named JSON schema for a structured response
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredSchema {
    pub name: String,
    pub schema: Value,
}

impl StructuredSchema {
    /// Derive the schema of `T`
    pub fn of<T: JsonSchema>(name: &str) -> Result<Self> {
        let schema = schemars::schema_for!(T);
        Ok(Self {
            name: name.to_string(),
            schema: serde_json::to_value(&schema)?,
        })
    }
}

/// Text and structured generation
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Free-form text completion
    async fn generate_text(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;

    /// JSON completion constrained by `schema`
    async fn generate_json(
        &self,
        prompt: &str,
        schema: &StructuredSchema,
        options: &GenerationOptions,
    ) -> Result<Value>;
}

/// Ask for a structured answer and decode it as `T`
pub async fn generate_structured<T>(
    model: &dyn LanguageModel,
    name: &str,
    prompt: &str,
    options: &GenerationOptions,
) -> Result<T>
where
    T: JsonSchema + DeserializeOwned,
{
    let schema = StructuredSchema::of::<T>(name)?;
    let value = model.generate_json(prompt, &schema, options).await?;
    serde_json::from_value(value)
        .map_err(|e| WorkerError::ModelError(format!("Malformed {} response: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::schema::{ExtractedRequirements, REQUIREMENTS_SCHEMA};
    use serde_json::json;

    struct CannedModel(Value);

    #[async_trait]
    impl LanguageModel for CannedModel {
        async fn generate_text(&self, _prompt: &str, _options: &GenerationOptions) -> Result<String> {
            Ok(self.0.to_string())
        }

        async fn generate_json(
            &self,
            _prompt: &str,
            _schema: &StructuredSchema,
            _options: &GenerationOptions,
        ) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_schema_lists_fields() {
        let schema = StructuredSchema::of::<ExtractedRequirements>(REQUIREMENTS_SCHEMA).unwrap();
        assert_eq!(schema.name, "extracted_requirements");
        assert!(schema.schema["properties"]["checklist"].is_object());
    }

    #[tokio::test]
    async fn test_generate_structured_decodes() {
        let model = CannedModel(json!({
            "checklist": [{"name": "Budget", "description": "Cost table", "is_mandatory": true}],
            "summary": "One item"
        }));
        let result: ExtractedRequirements =
            generate_structured(&model, REQUIREMENTS_SCHEMA, "prompt", &GenerationOptions::default())
                .await
                .unwrap();
        assert_eq!(result.checklist.len(), 1);
        assert!(result.checklist[0].is_mandatory);
    }

    #[tokio::test]
    async fn test_generate_structured_rejects_wrong_shape() {
        let model = CannedModel(json!({"unexpected": true}));
        let err = generate_structured::<ExtractedRequirements>(
            &model,
            REQUIREMENTS_SCHEMA,
            "prompt",
            &GenerationOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Malformed extracted_requirements response"));
    }
}
