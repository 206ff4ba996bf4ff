//! Client for Dify chat, agent, and workflow apps.
//!
//! This module provides the core client implementation for the SDK. It
//! builds the `/chat-messages` request for the configured app type, uploads
//! image attachments, and turns the response into a single
//! [`DifyResponse`].
//!
//! # Request Flow
//!
//! ```text
//! invoke(conversation_id, text, image, inputs, start_as_new)
//!     |
//!     +-> TextGenerator mode rejected before any network work
//!     |
//!     +-> optional image upload to /files/upload -> opaque file id
//!     |
//!     +-> POST /chat-messages (response_mode per DifyMode)
//!     |
//!     +-> non-success status -> Error::Api with the captured body
//!     |
//!     +-> streaming modes: bytes -> RecordSplitter -> decode_record
//!     |       -> mode fold table -> DifyResponse
//!     |
//!     +-> Chatbot mode: single blocking JSON body -> DifyResponse
//! ```
//!
//! The fold table is selected once, at construction, from the configured
//! [`DifyMode`]; the streaming loop itself is mode-agnostic.
//!
//! # Error Handling
//!
//! Only transport failures (including non-success HTTP statuses) and the
//! unsupported TextGenerator mode surface as errors. Undecodable or
//! malformed stream records are absorbed silently so one noisy chunk never
//! aborts an otherwise-healthy stream; callers always see either a clean
//! [`DifyResponse`] or a single error.
//!
//! # Example
//!
//! ```rust,no_run
//! use dify_agent::{DifyClient, DifyMode, DifyOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = DifyOptions::builder()
//!         .api_key("app-...")
//!         .base_url("https://api.dify.ai/v1")
//!         .user("user-1234")
//!         .mode(DifyMode::Agent)
//!         .build()?;
//!
//!     let client = DifyClient::new(options)?;
//!     let response = client.invoke("", "Hello!", None, None, false).await?;
//!
//!     println!("[{}] {}", response.conversation_id, response.text);
//!     Ok(())
//! }
//! ```

use crate::fold::{EventFold, fold_table};
use crate::stream::{RecordSplitter, decode_record};
use crate::types::{
    BlockingChatResponse, ChatRequest, DifyMode, DifyOptions, DifyResponse, FileAttachment,
    UploadResponse,
};
use crate::{Error, Result};
use futures::StreamExt;
use serde_json::{Map, Value};
use std::time::Duration;

/// Client for one Dify application.
///
/// Construction fixes the application mode, so one client instance always
/// speaks a single event vocabulary. The client holds no per-conversation
/// state; each [`invoke`](Self::invoke) owns its own record buffer and
/// aggregate, which makes concurrent invocations for independent
/// conversations safe over a shared client.
pub struct DifyClient {
    /// Read-only configuration shared by all invocations.
    options: DifyOptions,

    /// Reusable HTTP client, built once with the configured timeout.
    http_client: reqwest::Client,

    /// Fold table for the configured mode; `None` for the blocking modes.
    fold: Option<EventFold>,
}

impl DifyClient {
    /// Creates a new client with the specified configuration.
    ///
    /// # Errors
    ///
    /// Returns a config error if the underlying HTTP client cannot be
    /// built.
    pub fn new(options: DifyOptions) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.timeout))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let fold = fold_table(options.mode);

        Ok(Self {
            options,
            http_client,
            fold,
        })
    }

    /// Read access to the client configuration.
    pub fn options(&self) -> &DifyOptions {
        &self.options
    }

    /// Sends one message and returns the aggregated response.
    ///
    /// # Parameters
    ///
    /// - `conversation_id`: id of an existing conversation, or empty to let
    ///   the backend start one
    /// - `text`: the user's query; may be empty when an image is attached
    /// - `image`: optional raw image bytes, uploaded before the chat call
    /// - `inputs`: optional structured input map for the app
    /// - `start_as_new`: ignore `conversation_id` and force a new
    ///   conversation
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedMode`] for TextGenerator clients, raised
    ///   before any network interaction
    /// - [`Error::Api`] for non-success HTTP statuses, with the error body
    ///   captured for diagnostics
    /// - [`Error::Http`] / [`Error::Json`] for transport and decode
    ///   failures of the outer call
    pub async fn invoke(
        &self,
        conversation_id: &str,
        text: &str,
        image: Option<&[u8]>,
        inputs: Option<Map<String, Value>>,
        start_as_new: bool,
    ) -> Result<DifyResponse> {
        // TextGenerator apps have no response processor. Fail before any
        // request is built or sent.
        if self.options.mode == DifyMode::TextGenerator {
            return Err(Error::UnsupportedMode(self.options.mode));
        }

        let mut request = self.make_payloads(text, image, inputs).await?;

        if !conversation_id.is_empty() && !start_as_new {
            request.conversation_id = Some(conversation_id.to_string());
        }

        if self.options.verbose {
            log::info!("Request to Dify: {}", serde_json::to_string(&request)?);
        }

        let url = format!("{}/chat-messages", self.options.base_url);
        let response = self
            .http_client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.options.api_key),
            )
            .json(&request)
            .send()
            .await
            .map_err(Error::Http)?;

        // Check for HTTP-level errors before touching the body stream.
        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error (failed to read response body)".to_string());
            log::error!("Error response from Dify: {}", body);
            return Err(Error::api(status, body));
        }

        match self.fold {
            Some(fold) => self.process_streaming(response, fold).await,
            None => self.process_blocking(response).await,
        }
    }

    /// Builds the `/chat-messages` payload, uploading the image first when
    /// one is supplied.
    pub async fn make_payloads(
        &self,
        text: &str,
        image_bytes: Option<&[u8]>,
        inputs: Option<Map<String, Value>>,
    ) -> Result<ChatRequest> {
        let mut request = ChatRequest {
            inputs: inputs.unwrap_or_default(),
            query: text.to_string(),
            response_mode: self.options.mode.response_mode().to_string(),
            user: self.options.user.clone(),
            auto_generate_name: false,
            conversation_id: None,
            files: None,
        };

        if let Some(bytes) = image_bytes {
            let uploaded_image_id = self.upload_image(bytes).await?;
            attach_image(&mut request, uploaded_image_id);
        }

        Ok(request)
    }

    /// Uploads raw image bytes to `/files/upload` and returns the opaque
    /// file id the backend assigned.
    pub async fn upload_image(&self, image_bytes: &[u8]) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(image_bytes.to_vec())
            .file_name("image.png")
            .mime_str("image/png")?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("user", self.options.user.clone());

        let url = format!("{}/files/upload", self.options.base_url);
        let response = self
            .http_client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.options.api_key),
            )
            .multipart(form)
            .send()
            .await
            .map_err(Error::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error (failed to read response body)".to_string());
            log::error!("Error response from file upload: {}", body);
            return Err(Error::api(status, body));
        }

        let upload: UploadResponse = response.json().await?;
        if self.options.verbose {
            log::info!("File upload response id: {}", upload.id);
        }

        Ok(upload.id)
    }

    /// Consumes the streamed event feed and folds it into a response.
    ///
    /// Each body fragment is fed to the record splitter; records that fail
    /// to decode as events are dropped and streaming continues. The
    /// aggregate is finalized the moment the body stream closes.
    async fn process_streaming(
        &self,
        response: reqwest::Response,
        fold: EventFold,
    ) -> Result<DifyResponse> {
        let mut splitter = RecordSplitter::new();
        let mut result = DifyResponse::new();
        let mut body = response.bytes_stream();

        while let Some(fragment) = body.next().await {
            let fragment = fragment.map_err(Error::Http)?;

            for record in splitter.feed(&fragment) {
                let Some(event) = decode_record(&record) else {
                    continue;
                };

                if self.options.verbose {
                    log::debug!("Chunk from Dify: {}", event.payload);
                }

                fold(&mut result, event, &self.options.base_url);
            }
        }

        Ok(result)
    }

    /// Parses the single blocking JSON body returned by Chatbot apps.
    async fn process_blocking(&self, response: reqwest::Response) -> Result<DifyResponse> {
        let body: Value = response.json().await?;

        if self.options.verbose {
            log::info!("Response from Dify: {}", body);
        }

        let parsed: BlockingChatResponse = serde_json::from_value(body)?;

        Ok(DifyResponse {
            conversation_id: parsed.conversation_id,
            text: parsed.answer,
            metadata: Map::new(),
        })
    }
}

/// Attaches an uploaded image to the request. An empty query is replaced
/// with a single-character placeholder so the backend's empty-query
/// validation passes.
fn attach_image(request: &mut ChatRequest, upload_file_id: String) {
    request.files = Some(vec![FileAttachment::local_image(upload_file_id)]);

    if request.query.is_empty() {
        request.query = ".".to_string();
    }
}
