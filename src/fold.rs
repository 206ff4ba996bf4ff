//! Per-mode event fold tables.
//!
//! Each streaming mode recognizes its own event vocabulary and folds the
//! event sequence into a single [`DifyResponse`] in record-arrival order.
//! Whether a metadata key is overwritten or appended follows the
//! cardinality of the underlying concept: a workflow run starts and ends
//! once, so `workflow_started`/`workflow_ended` overwrite a single
//! snapshot, while nodes execute many times, so `node_started`/
//! `node_finished` append to lists. Unknown kinds within a known mode are
//! ignored without error.
//!
//! The mode-to-table mapping is resolved once, at client construction, via
//! [`fold_table`]; the decode loop then applies the selected function to
//! every event without further mode branching.

use crate::stream::StreamEvent;
use crate::types::{DifyMode, DifyResponse};
use serde_json::{Map, Value};

/// A fold rule set for one streaming mode. Applies a single event to the
/// in-progress response; the third argument is the client's base URL,
/// needed to build file descriptors.
pub type EventFold = fn(&mut DifyResponse, StreamEvent, &str);

/// Snapshot field set for `workflow_started` events.
const WORKFLOW_STARTED_FIELDS: &[&str] = &[
    "task_id",
    "workflow_run_id",
    "data",
    "id",
    "workflow_id",
    "sequence_number",
    "created_at",
];

/// Snapshot field set for `workflow_ended` events.
const WORKFLOW_ENDED_FIELDS: &[&str] = &[
    "task_id",
    "workflow_run_id",
    "data",
    "id",
    "workflow_id",
    "status",
    "outputs",
    "error",
    "elapsed_time",
    "total_tokens",
    "total_steps",
    "created_at",
    "finished_at",
];

/// Snapshot field set for `node_started` events.
const NODE_STARTED_FIELDS: &[&str] = &[
    "task_id",
    "workflow_run_id",
    "data",
    "id",
    "node_id",
    "node_type",
    "title",
    "index",
    "predecessor_node_id",
    "inputs",
    "created_at",
];

/// Snapshot field set for `node_finished` events.
const NODE_FINISHED_FIELDS: &[&str] = &[
    "task_id",
    "workflow_run_id",
    "data",
    "id",
    "node_id",
    "node_type",
    "title",
    "index",
    "predecessor_node_id",
    "inputs",
    "process_data",
    "outputs",
    "status",
    "error",
    "elapsed_time",
    "execution_metadata",
    "total_tokens",
    "total_price",
    "currency",
    "created_at",
];

/// Returns the fold table for `mode`, or `None` for the blocking modes
/// that never see an event stream.
pub fn fold_table(mode: DifyMode) -> Option<EventFold> {
    match mode {
        DifyMode::Agent => Some(fold_agent_event),
        DifyMode::Workflow => Some(fold_workflow_event),
        DifyMode::Chatbot | DifyMode::TextGenerator => None,
    }
}

/// Fold rules for Agent apps.
pub fn fold_agent_event(response: &mut DifyResponse, event: StreamEvent, base_url: &str) {
    match event.event.as_str() {
        "agent_message" => fold_answer(response, &event.payload),

        "agent_thought" => {
            if let Some(tool) = present(&event.payload, "tool") {
                response.metadata.insert("tool".to_string(), tool);
            }
            if let Some(tool_input) = present(&event.payload, "tool_input") {
                response.metadata.insert("tool_input".to_string(), tool_input);
            }
        }

        "message_end" => fold_message_end(response, &event.payload),

        "message_file" => {
            let mut file = Map::new();
            file.insert(
                "base_url".to_string(),
                Value::String(base_url.trim_end_matches('/').to_string()),
            );
            for key in ["url", "id", "type", "belongs_to", "conversation_id"] {
                file.insert(
                    key.to_string(),
                    event.payload.get(key).cloned().unwrap_or(Value::Null),
                );
            }
            push_to_list(response, "files", Value::Object(file));
        }

        _ => {}
    }
}

/// Fold rules for Workflow apps.
pub fn fold_workflow_event(response: &mut DifyResponse, event: StreamEvent, _base_url: &str) {
    match event.event.as_str() {
        "message" => fold_answer(response, &event.payload),

        "message_end" => fold_message_end(response, &event.payload),

        "workflow_started" => {
            response.metadata.insert(
                "workflow_started".to_string(),
                snapshot(&event.payload, WORKFLOW_STARTED_FIELDS),
            );
        }

        "workflow_ended" => {
            response.metadata.insert(
                "workflow_ended".to_string(),
                snapshot(&event.payload, WORKFLOW_ENDED_FIELDS),
            );
        }

        "node_started" => {
            let item = snapshot(&event.payload, NODE_STARTED_FIELDS);
            push_to_list(response, "node_started", item);
        }

        "node_finished" => {
            let item = snapshot(&event.payload, NODE_FINISHED_FIELDS);
            push_to_list(response, "node_finished", item);
        }

        _ => {}
    }
}

/// Assigns the conversation id (first non-empty occurrence wins, never
/// overwritten afterwards) and appends the answer fragment.
fn fold_answer(response: &mut DifyResponse, payload: &Value) {
    if response.conversation_id.is_empty() {
        if let Some(id) = payload.get("conversation_id").and_then(Value::as_str) {
            response.conversation_id = id.to_string();
        }
    }

    if let Some(answer) = payload.get("answer").and_then(Value::as_str) {
        response.text.push_str(answer);
    }
}

/// Copies `retriever_resources` out of the event's nested metadata, when
/// present and non-empty.
fn fold_message_end(response: &mut DifyResponse, payload: &Value) {
    let resources = payload
        .get("metadata")
        .and_then(|metadata| metadata.get("retriever_resources"));

    if let Some(resources) = resources {
        if !resources.is_null() && resources.as_array().is_none_or(|list| !list.is_empty()) {
            response
                .metadata
                .insert("retriever_resources".to_string(), resources.clone());
        }
    }
}

/// Field is considered present when it exists and is neither null nor an
/// empty string.
fn present(payload: &Value, key: &str) -> Option<Value> {
    let value = payload.get(key)?;
    if value.is_null() {
        return None;
    }
    if value.as_str().is_some_and(str::is_empty) {
        return None;
    }
    Some(value.clone())
}

/// Snapshot of the listed fields, each defaulting to null when missing.
fn snapshot(payload: &Value, fields: &[&str]) -> Value {
    let mut object = Map::new();
    for field in fields {
        object.insert(
            (*field).to_string(),
            payload.get(*field).cloned().unwrap_or(Value::Null),
        );
    }
    Value::Object(object)
}

/// Appends `item` to the list at `key`, creating the list lazily on first
/// occurrence.
fn push_to_list(response: &mut DifyResponse, key: &str, item: Value) {
    let entry = response
        .metadata
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));

    if let Value::Array(list) = entry {
        list.push(item);
    }
}
