use async_trait::async_trait;
use chrono::Utc;

use crate::action::{ActionDescriptor, ActionInvocation};
use crate::clients::openai_client;
use crate::error::ModelError;
use crate::models::conversation::Turn;

/// What the model decided to do with the latest turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply {
    Text(String),
    Invocation(ActionInvocation),
}

/// Language model boundary. Implementations get no memory beyond `history`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(
        &self,
        history: &[Turn],
        actions: &[ActionDescriptor],
    ) -> Result<ModelReply, ModelError>;
}

pub struct OpenAIService {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIService {
    pub fn new(api_key: String) -> Self {
        Self::with_model(
            api_key,
            openai_client::DEFAULT_MODEL.to_string(),
            openai_client::DEFAULT_BASE_URL.to_string(),
        )
    }

    pub fn with_model(api_key: String, model: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
            base_url,
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAIService {
    async fn complete(
        &self,
        history: &[Turn],
        actions: &[ActionDescriptor],
    ) -> Result<ModelReply, ModelError> {
        let request = openai_client::build_request(&self.model, history, actions, Utc::now());
        tracing::debug!(model = %self.model, turns = history.len(), "querying openai");
        openai_client::query_openai(&self.http, &self.base_url, &self.api_key, &request).await
    }
}
