//! Versioned payload codec for work items.
//!
//! Payloads are JSON envelopes carrying an explicit schema version:
//!
//! ```text
//! {"v":1,"work":{"id":"...","queue_id":"...", ...}}
//! ```
//!
//! Fields added to `WorkItem` later must be `#[serde(default)]` so version 1
//! payloads written by older processes keep decoding.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

use super::item::WorkItem;

/// Schema version written by this codec.
pub const PAYLOAD_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    v: u32,
    work: &'a WorkItem,
}

#[derive(Deserialize)]
struct VersionHeader {
    v: u32,
}

#[derive(Deserialize)]
struct Envelope {
    work: WorkItem,
}

/// Converts work items to and from the bytes stored in the `data` hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkCodec;

impl WorkCodec {
    pub fn new() -> Self {
        Self
    }

    /// Encodes a work item into a versioned payload.
    pub fn encode(&self, work: &WorkItem) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(&EnvelopeRef {
            v: PAYLOAD_VERSION,
            work,
        })
        .map_err(|source| CodecError::Encode {
            work_id: work.id.clone(),
            source,
        })
    }

    /// Decodes a stored payload.
    ///
    /// A missing or empty payload means the item does not exist and yields
    /// `Ok(None)`. Anything else that fails to decode is an error.
    pub fn decode(&self, bytes: Option<&[u8]>) -> Result<Option<WorkItem>, CodecError> {
        let bytes = match bytes {
            Some(b) if !b.is_empty() => b,
            _ => return Ok(None),
        };

        let header: VersionHeader = serde_json::from_slice(bytes)?;
        if header.v == 0 || header.v > PAYLOAD_VERSION {
            return Err(CodecError::UnsupportedVersion {
                found: header.v,
                supported: PAYLOAD_VERSION,
            });
        }

        let envelope: Envelope = serde_json::from_slice(bytes)?;
        Ok(Some(envelope.work))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work::WorkState;

    #[test]
    fn test_roundtrip_preserves_result_fields() {
        let codec = WorkCodec::new();
        let mut item = WorkItem::new("default", "convert")
            .with_title("Convert blob")
            .with_payload(serde_json::json!({"blob": "b1", "formats": ["pdf"]}));
        item.state = WorkState::Completed;
        item.attempts = 2;
        item.completion_time = Some(1_700_000_000_000);
        item.set_result(serde_json::json!({"pages": 12}));

        let bytes = codec.encode(&item).expect("encode should work");
        let decoded = codec
            .decode(Some(&bytes))
            .expect("decode should work")
            .expect("payload should be present");

        assert_eq!(decoded, item);
    }

    #[test]
    fn test_envelope_carries_version() {
        let bytes = WorkCodec::new()
            .encode(&WorkItem::new("q", "c").with_id("w"))
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["v"], PAYLOAD_VERSION);
        assert_eq!(value["work"]["id"], "w");
    }

    #[test]
    fn test_decode_absent_payload() {
        let codec = WorkCodec::new();
        assert!(codec.decode(None).unwrap().is_none());
        assert!(codec.decode(Some(b"")).unwrap().is_none());
    }

    #[test]
    fn test_decode_corrupt_payload_is_error() {
        let codec = WorkCodec::new();
        let err = codec.decode(Some(b"\xac\xed\x00\x05sr")).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));

        let err = codec.decode(Some(br#"{"v":1,"work":{"id":3}}"#)).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }

    #[test]
    fn test_decode_future_version_is_rejected() {
        let err = WorkCodec::new()
            .decode(Some(br#"{"v":7,"work":{}}"#))
            .unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnsupportedVersion {
                found: 7,
                supported: PAYLOAD_VERSION
            }
        ));
    }

    #[test]
    fn test_decode_tolerates_missing_optional_fields() {
        let raw = br#"{"v":1,"work":{"id":"w1","queue_id":"q","category":"c","state":"running","created_at":"2024-01-01T00:00:00Z"}}"#;
        let item = WorkCodec::new().decode(Some(raw)).unwrap().unwrap();

        assert_eq!(item.id, "w1");
        assert_eq!(item.state, WorkState::Running);
        assert!(item.payload.is_null());
        assert_eq!(item.attempts, 0);
    }
}
