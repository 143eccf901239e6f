//! OpenAI chat-completions request and response types.
//!
//! This module contains the serde types for serializing requests to and
//! deserializing responses from `/v1/chat/completions`.

use serde::{Deserialize, Serialize};

use crate::provider::PromptMessage;

/// Request sent to the chat-completions endpoint.
#[derive(Debug, Serialize)]
pub struct ApiRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [PromptMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Response received from the chat-completions endpoint.
#[derive(Debug, Deserialize, Clone)]
pub struct ApiResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Vec<ApiChoice>,
    #[serde(default)]
    pub usage: Option<ApiUsage>,
}

/// One completion choice.
#[derive(Debug, Deserialize, Clone)]
pub struct ApiChoice {
    pub message: ApiResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Message inside a choice. `content` is null for refusals and tool calls.
#[derive(Debug, Deserialize, Clone)]
pub struct ApiResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Token usage information from the API response.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ApiUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

/// Error envelope returned with non-2xx statuses.
#[derive(Debug, Deserialize)]
pub struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

/// Error details.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
}
