//! Streaming record reassembly and event decoding.
//!
//! Dify streams responses as pseudo-SSE records: `data:`-prefixed JSON
//! payloads separated by blank lines. HTTP chunking can split that stream at
//! arbitrary byte positions, including in the middle of a multi-byte UTF-8
//! character, so the raw bytes cannot be decoded fragment by fragment.
//!
//! This module addresses the two low-level halves of the problem:
//!
//! 1. **Record reassembly** ([`RecordSplitter`]): a stateful byte buffer
//!    that turns an unbounded sequence of raw fragments into complete,
//!    `\n\n`-bounded text records, carrying undecodable trailing bytes over
//!    to the next fragment.
//!
//! 2. **Event decoding** ([`decode_record`]): strips the `data:` framing
//!    prefix and parses the payload into a kind-tagged [`StreamEvent`].
//!    Malformed records decode to `None` so a single noisy chunk never
//!    aborts an otherwise-healthy stream.
//!
//! ```text
//! Raw HTTP bytes: b"data:{\"event\":\"agent_message\",...}\n\ndata:{...}\n\n"
//!        |
//!        | RecordSplitter::feed()
//!        v
//! Vec<String>  ("data:{...}" records)
//!        |
//!        | decode_record()
//!        v
//! StreamEvent { event, payload }
//! ```
//!
//! The per-mode fold tables consume these events to build the final
//! [`crate::DifyResponse`].

use serde_json::Value;

/// Record delimiter on the wire: a blank line between events.
const RECORD_DELIMITER: &[u8] = b"\n\n";

/// Framing prefix a record must carry to be decodable as an event.
const DATA_PREFIX: &str = "data:";

/// Reassembles delimiter-bounded text records from raw byte fragments.
///
/// The splitter owns a pending buffer of bytes that do not yet form a
/// complete record. Each [`feed`](Self::feed) call appends a fragment and
/// drains every complete record the buffer now contains, in arrival order.
///
/// # UTF-8 boundary handling
///
/// A delimited candidate that fails UTF-8 decoding is not emitted and not
/// lost: the candidate plus its delimiter are reattached to the front of
/// the buffer and splitting stops until more bytes arrive. Bytes still in
/// the buffer when the upstream source closes belong to an incomplete
/// record and are discarded with the splitter.
pub struct RecordSplitter {
    /// Bytes received but not yet emitted as a complete record.
    /// Only ever appended to and drained, never discarded mid-stream.
    pending: Vec<u8>,
}

impl RecordSplitter {
    /// Creates a splitter with an empty pending buffer.
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Appends a fragment and returns every complete record it unlocked.
    ///
    /// May return an empty vector when the fragment does not complete any
    /// record. Records are returned in the order their terminating
    /// delimiters arrived.
    pub fn feed(&mut self, fragment: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(fragment);

        let mut records = Vec::new();
        while let Some(pos) = find_delimiter(&self.pending) {
            // Split off everything after the delimiter; the candidate is
            // what remains, minus the delimiter itself.
            let rest = self.pending.split_off(pos + RECORD_DELIMITER.len());
            let mut candidate = std::mem::replace(&mut self.pending, rest);
            candidate.truncate(pos);

            match String::from_utf8(candidate) {
                Ok(record) => records.push(record),
                Err(err) => {
                    // A multi-byte character was split across the boundary.
                    // Reattach candidate + delimiter to the front of the
                    // buffer and wait for more bytes.
                    let mut restored = err.into_bytes();
                    restored.extend_from_slice(RECORD_DELIMITER);
                    restored.append(&mut self.pending);
                    self.pending = restored;
                    break;
                }
            }
        }

        records
    }
}

impl Default for RecordSplitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Position of the first record delimiter in `buffer`, if any.
fn find_delimiter(buffer: &[u8]) -> Option<usize> {
    buffer.windows(RECORD_DELIMITER.len()).position(|w| w == RECORD_DELIMITER)
}

/// One decoded event from the stream: the kind discriminant plus the full
/// JSON payload it was read from.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    /// Value of the payload's `event` field.
    pub event: String,

    /// Complete JSON payload, including the `event` field.
    pub payload: Value,
}

/// Decodes one record into a [`StreamEvent`], or `None` if the record is
/// not an event.
///
/// A record qualifies only when it starts with the literal `data:` prefix,
/// the remainder parses as JSON, and the parsed object carries a string
/// `event` discriminant. Anything else is dropped; dropping is never fatal
/// to the stream.
pub fn decode_record(record: &str) -> Option<StreamEvent> {
    let data = record.strip_prefix(DATA_PREFIX)?;

    let payload: Value = serde_json::from_str(data).ok()?;
    let event = payload.get("event")?.as_str()?.to_string();

    Some(StreamEvent { event, payload })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &[u8] = "data:{\"event\":\"agent_message\",\"answer\":\"h\u{00e9}llo \u{4e16}\u{754c}\"}\n\ndata:{\"event\":\"message_end\"}\n\n".as_bytes();

    #[test]
    fn test_single_feed_emits_all_records() {
        let mut splitter = RecordSplitter::new();
        let records = splitter.feed(STREAM);

        assert_eq!(records.len(), 2);
        assert!(records[0].contains("agent_message"));
        assert!(records[1].contains("message_end"));
    }

    #[test]
    fn test_reassembly_is_split_invariant() {
        let expected = RecordSplitter::new().feed(STREAM);
        assert_eq!(expected.len(), 2);

        // Splitting the byte stream at every possible offset, including in
        // the middle of the multi-byte characters, must yield the same
        // ordered record list as a single feed.
        for split in 1..STREAM.len() {
            let mut splitter = RecordSplitter::new();
            let mut records = splitter.feed(&STREAM[..split]);
            records.extend(splitter.feed(&STREAM[split..]));
            assert_eq!(records, expected, "split at byte offset {}", split);
        }
    }

    #[test]
    fn test_record_count_matches_delimiter_count() {
        let mut splitter = RecordSplitter::new();
        assert_eq!(splitter.feed(b"no delimiter here").len(), 0);
        assert_eq!(splitter.feed(b"\n\nsecond\n\nthird").len(), 2);
        assert_eq!(splitter.feed(b"\n\n").len(), 1);
    }

    #[test]
    fn test_trailing_bytes_are_never_emitted() {
        let mut splitter = RecordSplitter::new();
        let records = splitter.feed(b"data:{\"event\":\"message\"}\n\ndata:{\"trunc");
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_empty_records_are_preserved() {
        let mut splitter = RecordSplitter::new();
        let records = splitter.feed(b"\n\n\n\n");
        assert_eq!(records, vec!["".to_string(), "".to_string()]);
    }

    #[test]
    fn test_undecodable_candidate_is_reattached() {
        let mut splitter = RecordSplitter::new();

        // 0xff can never complete to valid UTF-8, so the delimited
        // candidate is reattached and the splitter keeps waiting.
        assert_eq!(splitter.feed(b"data:\xff\n\n").len(), 0);
        assert_eq!(splitter.feed(b"more bytes\n\n").len(), 0);
    }

    #[test]
    fn test_multibyte_split_before_delimiter_arrives() {
        // "né" split in the middle of the two-byte é.
        let bytes = "data:n\u{00e9}\n\n".as_bytes();
        let mut splitter = RecordSplitter::new();

        assert_eq!(splitter.feed(&bytes[..7]).len(), 0);
        let records = splitter.feed(&bytes[7..]);
        assert_eq!(records, vec!["data:n\u{00e9}".to_string()]);
    }

    #[test]
    fn test_decode_record_requires_data_prefix() {
        assert!(decode_record("event:{\"event\":\"message\"}").is_none());
        assert!(decode_record("ping").is_none());
        assert!(decode_record("").is_none());
    }

    #[test]
    fn test_decode_record_drops_malformed_json() {
        assert!(decode_record("data:{not json").is_none());
        assert!(decode_record("data:").is_none());
    }

    #[test]
    fn test_decode_record_requires_event_discriminant() {
        assert!(decode_record("data:{\"answer\":\"no kind\"}").is_none());
        assert!(decode_record("data:{\"event\":42}").is_none());
    }

    #[test]
    fn test_decode_record_success() {
        let event =
            decode_record("data: {\"event\":\"agent_message\",\"answer\":\"hi\"}").unwrap();
        assert_eq!(event.event, "agent_message");
        assert_eq!(event.payload["answer"], "hi");
    }
}
