//! services/engine/src/adapters/generation.rs
//!
//! The adapter for the remote text-generation endpoint. The endpoint
//! speaks the OpenAI chat-completions protocol behind a configurable
//! base URL, so this implements the `GenerationService` port with an
//! OpenAI-compatible client in both whole-response and streaming modes.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use futures::StreamExt;

use tawakkul_core::ports::{GenerationService, PortError, PortResult, TextStream};

/// An adapter that implements `GenerationService` against an
/// OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct OpenAiGenerationAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAiGenerationAdapter {
    /// Creates a new `OpenAiGenerationAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String, temperature: f32) -> Self {
        Self {
            client,
            model,
            temperature,
        }
    }

    fn build_request(&self, document: &str) -> PortResult<CreateChatCompletionRequest> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(document)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![message.into()])
            .temperature(self.temperature)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

#[async_trait]
impl GenerationService for OpenAiGenerationAdapter {
    /// Submits the composed document and returns the whole response text.
    async fn generate(&self, document: &str) -> PortResult<String> {
        let request = self.build_request(document)?;
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Generation(e.to_string()))?;

        if let Some(choice) = response.choices.into_iter().next() {
            if let Some(content) = choice.message.content {
                Ok(content)
            } else {
                Err(PortError::Generation(
                    "generation response contained no text content".to_string(),
                ))
            }
        } else {
            Err(PortError::Generation(
                "generation endpoint returned no choices".to_string(),
            ))
        }
    }

    /// Submits the composed document and decodes the response frame by
    /// frame, delivering each delta as soon as it is parsed.
    async fn generate_streaming(&self, document: &str) -> PortResult<TextStream> {
        let request = self.build_request(document)?;
        let mut frames = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e: OpenAIError| PortError::Generation(e.to_string()))?;

        Ok(Box::pin(async_stream::stream! {
            while let Some(frame) = frames.next().await {
                match frame {
                    Ok(response) => {
                        if let Some(choice) = response.choices.into_iter().next() {
                            if let Some(content) = choice.delta.content {
                                if !content.is_empty() {
                                    yield Ok(content);
                                }
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(PortError::Generation(e.to_string()));
                        break;
                    }
                }
            }
        }))
    }
}
