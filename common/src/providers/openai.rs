use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequestArgs, CreateEmbeddingRequestArgs, ResponseFormat,
    },
    Client,
};
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    Retry,
};
use tracing::debug;

use crate::{error::AppError, utils::config::AppConfig};

use super::{ChatOutcome, TokenUsage};

/// Real model backend over the OpenAI-compatible API. Transient failures are
/// retried with exponential backoff; every call carries a hard timeout so a
/// wedged upstream cannot pin a request handler.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    chat_model: String,
    embedding_model: String,
    dimension: usize,
    batch_size: usize,
    max_retries: usize,
    call_timeout: Duration,
}

impl OpenAiProvider {
    pub fn from_config(config: &AppConfig) -> Self {
        let client = Client::with_config(
            OpenAIConfig::new()
                .with_api_key(&config.openai_api_key)
                .with_api_base(&config.openai_base_url),
        );

        Self {
            client,
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            dimension: config.embed_dim,
            batch_size: config.embed_batch_size.max(1),
            max_retries: config.provider_max_retries,
            call_timeout: Duration::from_secs(config.provider_timeout_secs),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn retry_strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(200)
            .map(jitter)
            .take(self.max_retries)
    }

    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let batch_vectors = Retry::spawn(self.retry_strategy(), || async {
                self.embed_batch(batch).await
            })
            .await?;
            vectors.extend(batch_vectors);
        }

        Ok(vectors)
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.embedding_model)
            .dimensions(u32::try_from(self.dimension).unwrap_or(u32::MAX))
            .input(batch.to_vec())
            .build()?;

        let response = tokio::time::timeout(self.call_timeout, async {
            self.client.embeddings().create(request).await
        })
        .await
        .map_err(|_| AppError::Timeout("embedding call exceeded its deadline".into()))?
        .map_err(|e| AppError::Provider(format!("embedding request failed: {e}")))?;

        if response.data.len() != batch.len() {
            return Err(AppError::Provider(format!(
                "embedding response returned {} vectors for {} inputs",
                response.data.len(),
                batch.len()
            )));
        }

        debug!(batch = batch.len(), "embedded batch");

        let mut ordered = response.data;
        ordered.sort_by_key(|d| d.index);
        Ok(ordered.into_iter().map(|d| d.embedding).collect())
    }

    pub async fn chat(&self, system: &str, user: &str) -> Result<ChatOutcome, AppError> {
        Retry::spawn(self.retry_strategy(), || async {
            self.chat_once(system, user).await
        })
        .await
    }

    async fn chat_once(&self, system: &str, user: &str) -> Result<ChatOutcome, AppError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.chat_model)
            .temperature(0.1)
            .max_tokens(1024u32)
            .response_format(ResponseFormat::JsonObject)
            .messages([
                ChatCompletionRequestSystemMessage::from(system.to_string()).into(),
                ChatCompletionRequestUserMessage::from(user.to_string()).into(),
            ])
            .build()?;

        let response = tokio::time::timeout(self.call_timeout, async {
            self.client.chat().create(request).await
        })
        .await
        .map_err(|_| AppError::Timeout("chat call exceeded its deadline".into()))?
        .map_err(|e| AppError::Provider(format!("chat request failed: {e}")))?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| AppError::Provider("chat response had no content".into()))?;

        let usage = response
            .usage
            .map(|usage| TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            })
            .unwrap_or_default();

        Ok(ChatOutcome { text, usage })
    }
}
