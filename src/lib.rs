//! # Dify Agent SDK
//!
//! An async Rust client for the [Dify](https://dify.ai) conversational AI
//! backend, covering Agent, Chatbot, and Workflow applications.
//!
//! ## Overview
//!
//! Dify exposes two response transports behind one endpoint: a blocking
//! JSON body (Chatbot apps) and an incrementally-streamed event feed of
//! `data:`-prefixed, blank-line-delimited JSON records (Agent and Workflow
//! apps). This crate hides that difference: every invocation returns a
//! single [`DifyResponse`] holding the conversation id, the accumulated
//! answer text, and a metadata map keyed by event kind.
//!
//! The streaming path is the interesting part. HTTP chunking can split the
//! event feed at any byte, including inside a multi-byte UTF-8 character,
//! so the SDK reassembles complete records from raw fragments, decodes
//! them into kind-tagged events, and folds each event into the result with
//! per-kind overwrite/append rules. Malformed records are dropped without
//! aborting the stream.
//!
//! ## Example
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
//!
//!     // Start a new conversation
//!     let response = client.invoke("", "Hello!", None, None, false).await?;
//!     println!("{}", response.text);
//!
//!     // Continue it
//!     let followup = client
//!         .invoke(&response.conversation_id, "Tell me more.", None, None, false)
//!         .await?;
//!     println!("{}", followup.text);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **client**: request construction, file upload, and per-mode response
//!   processing
//! - **stream**: record reassembly from raw byte fragments and event
//!   decoding
//! - **fold**: per-mode event fold tables building the response aggregate
//! - **types**: modes, options builder, response aggregate, wire payloads
//! - **config**: environment variable helpers
//! - **error**: error types and conversions

/// Core client implementation: payload construction, image upload, and the
/// invoke operation with per-mode response processing.
mod client;

/// Environment variable helpers for api key, base url, and user identity.
mod config;

/// Error types and conversions. Defines the `Error` enum and `Result<T>`
/// alias used across all public APIs.
mod error;

/// Per-mode event fold tables that build the response aggregate.
mod fold;

/// Record reassembly and event decoding for the streamed transport.
mod stream;

/// Modes, options, the response aggregate, and wire payload types.
mod types;

// --- Core Client API ---

pub use client::DifyClient;

// --- Configuration ---

pub use config::{DEFAULT_BASE_URL, get_api_key, get_base_url, get_user};

// --- Error Handling ---

pub use error::{Error, Result};

// --- Streaming Internals ---
// Exposed so the record/event/fold pipeline can be driven directly, e.g.
// when replaying captured streams.

pub use fold::{EventFold, fold_agent_event, fold_table, fold_workflow_event};
pub use stream::{RecordSplitter, StreamEvent, decode_record};

// --- Core Types ---

pub use types::{
    BlockingChatResponse, ChatRequest, DifyMode, DifyOptions, DifyOptionsBuilder, DifyResponse,
    FileAttachment, UploadResponse,
};

/// Convenience module containing the most commonly used types and
/// functions. Import with `use dify_agent::prelude::*;`.
pub mod prelude {
    pub use crate::{
        DifyClient, DifyMode, DifyOptions, DifyOptionsBuilder, DifyResponse, Error, Result,
    };
}
