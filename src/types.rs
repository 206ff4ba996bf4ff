//! Core types for the Dify agent SDK

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Dify application type backing the configured API key.
///
/// The mode is fixed at client construction and determines both the wire
/// `response_mode` (streaming for Agent and Workflow, blocking for Chatbot
/// and TextGenerator) and which event vocabulary is folded into the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifyMode {
    Agent,
    Chatbot,
    TextGenerator,
    Workflow,
}

impl DifyMode {
    /// Whether this mode consumes a streamed event feed rather than a
    /// single blocking JSON response.
    pub fn is_streaming(&self) -> bool {
        matches!(self, DifyMode::Agent | DifyMode::Workflow)
    }

    /// Wire value for the request's `response_mode` field.
    pub fn response_mode(&self) -> &'static str {
        if self.is_streaming() {
            "streaming"
        } else {
            "blocking"
        }
    }

    /// Parse a mode from a string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "agent" => Some(DifyMode::Agent),
            "chatbot" => Some(DifyMode::Chatbot),
            "textgenerator" | "text-generator" | "text_generator" => {
                Some(DifyMode::TextGenerator)
            }
            "workflow" => Some(DifyMode::Workflow),
            _ => None,
        }
    }
}

/// Options for configuring a Dify client
#[derive(Clone)]
pub struct DifyOptions {
    /// API key of the Dify application
    pub api_key: String,

    /// Dify API endpoint (e.g., "https://api.dify.ai/v1")
    pub base_url: String,

    /// User identifier sent with every request
    pub user: String,

    /// Application type behind the API key
    pub mode: DifyMode,

    /// Request timeout in seconds
    pub timeout: u64,

    /// Log request payloads and decoded chunks via the `log` facade
    pub verbose: bool,
}

impl std::fmt::Debug for DifyOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DifyOptions")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("mode", &self.mode)
            .field("timeout", &self.timeout)
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl DifyOptions {
    /// Create a new builder for DifyOptions
    pub fn builder() -> DifyOptionsBuilder {
        DifyOptionsBuilder::default()
    }
}

/// Builder for DifyOptions
#[derive(Default)]
pub struct DifyOptionsBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    user: Option<String>,
    mode: Option<DifyMode>,
    timeout: Option<u64>,
    verbose: Option<bool>,
}

impl std::fmt::Debug for DifyOptionsBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DifyOptionsBuilder")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("mode", &self.mode)
            .finish()
    }
}

impl DifyOptionsBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn mode(mut self, mode: DifyMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    pub fn build(self) -> crate::Result<DifyOptions> {
        let api_key = self
            .api_key
            .ok_or_else(|| crate::Error::config("api_key is required"))?;

        let base_url = self
            .base_url
            .ok_or_else(|| crate::Error::config("base_url is required"))?;

        let user = self
            .user
            .ok_or_else(|| crate::Error::config("user is required"))?;

        Ok(DifyOptions {
            api_key,
            base_url,
            user,
            mode: self.mode.unwrap_or(DifyMode::Agent),
            timeout: self.timeout.unwrap_or(60),
            verbose: self.verbose.unwrap_or(false),
        })
    }
}

/// Aggregated result of one invocation: the conversation id assigned by the
/// backend, the accumulated answer text, and an open-ended side channel of
/// structured metadata keyed by event kind.
///
/// Streaming modes build this up event by event; Chatbot mode fills in the
/// id and text from the blocking response and leaves the metadata empty.
/// A key absent from `metadata` means the corresponding event kind was
/// never observed, not that it was empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DifyResponse {
    pub conversation_id: String,
    pub text: String,
    pub metadata: Map<String, Value>,
}

impl DifyResponse {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Request payload for the `/chat-messages` endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub inputs: Map<String, Value>,
    pub query: String,
    pub response_mode: String,
    pub user: String,
    pub auto_generate_name: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileAttachment>>,
}

/// Reference to an already-uploaded file attached to a chat request
#[derive(Debug, Clone, Serialize)]
pub struct FileAttachment {
    #[serde(rename = "type")]
    pub file_type: String,
    pub transfer_method: String,
    pub upload_file_id: String,
}

impl FileAttachment {
    /// Attachment for an image uploaded via `/files/upload`
    pub fn local_image(upload_file_id: impl Into<String>) -> Self {
        Self {
            file_type: "image".to_string(),
            transfer_method: "local_file".to_string(),
            upload_file_id: upload_file_id.into(),
        }
    }
}

/// Body of a successful `/files/upload` call
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub id: String,
}

/// Blocking response body returned by Chatbot apps
#[derive(Debug, Clone, Deserialize)]
pub struct BlockingChatResponse {
    pub conversation_id: String,
    pub answer: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_transport_style() {
        assert!(DifyMode::Agent.is_streaming());
        assert!(DifyMode::Workflow.is_streaming());
        assert!(!DifyMode::Chatbot.is_streaming());
        assert!(!DifyMode::TextGenerator.is_streaming());

        assert_eq!(DifyMode::Agent.response_mode(), "streaming");
        assert_eq!(DifyMode::Chatbot.response_mode(), "blocking");
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!(DifyMode::from_str("agent"), Some(DifyMode::Agent));
        assert_eq!(DifyMode::from_str("Chatbot"), Some(DifyMode::Chatbot));
        assert_eq!(
            DifyMode::from_str("text-generator"),
            Some(DifyMode::TextGenerator)
        );
        assert_eq!(DifyMode::from_str("workflow"), Some(DifyMode::Workflow));
        assert_eq!(DifyMode::from_str("unknown"), None);
    }

    #[test]
    fn test_options_builder() {
        let options = DifyOptions::builder()
            .api_key("app-xxx")
            .base_url("https://api.dify.ai/v1")
            .user("line-user-1")
            .mode(DifyMode::Workflow)
            .verbose(true)
            .build()
            .unwrap();

        assert_eq!(options.base_url, "https://api.dify.ai/v1");
        assert_eq!(options.mode, DifyMode::Workflow);
        assert_eq!(options.timeout, 60);
        assert!(options.verbose);
    }

    #[test]
    fn test_options_builder_missing_required() {
        let result = DifyOptions::builder().api_key("app-xxx").build();
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_options_debug_masks_api_key() {
        let options = DifyOptions::builder()
            .api_key("app-secret")
            .base_url("https://api.dify.ai/v1")
            .user("u")
            .build()
            .unwrap();

        let debug = format!("{:?}", options);
        assert!(!debug.contains("app-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_chat_request_serialization_skips_absent_fields() {
        let request = ChatRequest {
            inputs: Map::new(),
            query: "hello".to_string(),
            response_mode: "streaming".to_string(),
            user: "u".to_string(),
            auto_generate_name: false,
            conversation_id: None,
            files: None,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("conversation_id").is_none());
        assert!(value.get("files").is_none());
        assert_eq!(value["auto_generate_name"], false);
    }

    #[test]
    fn test_file_attachment_local_image() {
        let attachment = FileAttachment::local_image("file-123");
        let value = serde_json::to_value(&attachment).unwrap();
        assert_eq!(value["type"], "image");
        assert_eq!(value["transfer_method"], "local_file");
        assert_eq!(value["upload_file_id"], "file-123");
    }
}
