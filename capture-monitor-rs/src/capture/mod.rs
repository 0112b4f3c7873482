//! Data capture records
//!
//! A capture file holds one JSON record per line, each pairing a model
//! request with its response. This module decodes the captured payloads
//! and normalizes a record into a [`NormalizedEvent`].

pub mod decoder;
pub mod record;

pub use decoder::{decode_payload, BASE64_ENCODING};
pub use record::{normalize, CapturedPayload, NormalizedEvent, RawCaptureRecord, UNKNOWN_EVENT_ID};
