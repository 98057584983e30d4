// AI implementation using OpenAI
//
// This is the infrastructure implementation of BaseAI.
// Business logic (what to prompt for) lives in the transcripts domain.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rig::completion::Prompt;
use rig::providers::openai;
use serde::{Deserialize, Serialize};

use super::{BaseAI, BaseEmbeddingService};

/// Dense embedding dimensionality for the configured OpenAI models.
pub const EMBEDDING_DIM: usize = 1536;

/// Dense embeddings are computed over at most this many characters.
const EMBEDDING_INPUT_LIMIT: usize = 8000;

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    input: String,
    model: String,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingData {
    pub embedding: Vec<f32>,
}

/// OpenAI implementation of AI capabilities
#[derive(Clone)]
pub struct OpenAIClient {
    client: openai::Client,
    api_key: String,
    embedding_model: String,
}

impl OpenAIClient {
    pub fn new(api_key: String, embedding_model: String) -> Self {
        let client = openai::Client::new(&api_key);
        Self {
            client,
            api_key,
            embedding_model,
        }
    }

    /// Generate embeddings using the configured OpenAI embedding model
    pub async fn create_embedding(&self, text: &str) -> Result<EmbeddingResponse> {
        let http_client = reqwest::Client::new();

        // Embedding models reject overly long inputs; truncate on a char boundary.
        let mut input = text;
        if input.len() > EMBEDDING_INPUT_LIMIT {
            let mut end = EMBEDDING_INPUT_LIMIT;
            while !input.is_char_boundary(end) {
                end -= 1;
            }
            input = &input[..end];
        }

        let request = EmbeddingRequest {
            input: input.to_string(),
            model: self.embedding_model.clone(),
        };

        let response = http_client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send embedding request to OpenAI")?;

        let embedding_response: EmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse embedding response")?;

        Ok(embedding_response)
    }
}

#[async_trait]
impl BaseAI for OpenAIClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        tracing::debug!(
            prompt_length = prompt.len(),
            "Building OpenAI agent for completion"
        );

        let agent = self
            .client
            .agent(openai::GPT_4O)
            .preamble("You are a helpful assistant.")
            .max_tokens(4096)
            .build();

        let response = agent
            .prompt(prompt)
            .await
            .map_err(|e| {
                let preview: String = prompt.chars().take(200).collect();
                tracing::error!(
                    error = %e,
                    prompt_preview = %preview,
                    "OpenAI API call failed"
                );
                e
            })
            .context("Failed to call OpenAI API")?;

        tracing::info!(
            response_length = response.len(),
            "OpenAI API response received"
        );

        Ok(response)
    }

    async fn complete_json(&self, prompt: &str) -> Result<String> {
        // Same as complete for OpenAI - format instructions live in the prompt
        self.complete(prompt).await
    }
}

#[async_trait]
impl BaseEmbeddingService for OpenAIClient {
    async fn generate(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .create_embedding(text)
            .await
            .context("Failed to create embedding")?;

        let embedding = response
            .data
            .first()
            .ok_or_else(|| anyhow::anyhow!("No embedding returned"))?
            .embedding
            .clone();

        Ok(embedding)
    }
}
