//! Per-shipment chat messages.
use crate::error::ValidationError;
use crate::types::{TimeStamp, UserId};
use serde::Serialize;

/// Default bound on the UTF-8 length of a message body.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub shipment_id: String,
    #[n(2)]
    pub sender_id: UserId,
    #[n(3)]
    pub sender_name: String, // copied from the directory when written
    #[n(4)]
    pub text: String,
    #[n(5)]
    pub timestamp: TimeStamp,
}

/// A message that has passed validation but has no id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub shipment_id: String,
    pub sender_id: UserId,
    pub sender_name: String,
    pub text: String,
    pub timestamp: TimeStamp,
}

impl NewMessage {
    pub fn into_message(self, id: u64) -> Message {
        Message {
            id,
            shipment_id: self.shipment_id,
            sender_id: self.sender_id,
            sender_name: self.sender_name,
            text: self.text,
            timestamp: self.timestamp,
        }
    }
}

/// Trims the text and enforces the size bound on what remains.
pub fn validate_text(text: &str, max_bytes: usize) -> Result<String, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    if text.len() > max_bytes {
        return Err(ValidationError::MessageTooLarge {
            len: text.len(),
            max: max_bytes,
        });
    }
    Ok(text.to_string())
}
