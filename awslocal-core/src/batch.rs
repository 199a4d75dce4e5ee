//! Validation of event-source batch payloads
//!
//! Both the SNS and SQS mock endpoints accept a JSON array of message objects.
//! Each element must carry a non-null `message` field before any record is built.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Field every batch element must provide
pub const PAYLOAD_FIELD: &str = "message";

/// Rejected event-source batch
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedBatchError {
    #[error("Batch body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Batch must be a JSON array of messages")]
    NotAnArray,

    #[error("Batch must contain at least one message")]
    Empty,

    #[error("Message at index {0} is not a JSON object")]
    NotAnObject(usize),

    #[error("Message at index {0} is missing a non-null `message` field")]
    MissingPayload(usize),

    #[error("Message at index {index} is invalid: {reason}")]
    InvalidMessage { index: usize, reason: String },
}

/// Parse a raw request body into a batch
pub fn parse_batch<T: DeserializeOwned>(body: &[u8]) -> Result<Vec<T>, MalformedBatchError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| MalformedBatchError::InvalidJson(e.to_string()))?;
    validate_batch(value)
}

/// Check the batch shape and deserialize each element
fn validate_batch<T: DeserializeOwned>(batch: Value) -> Result<Vec<T>, MalformedBatchError> {
    let Value::Array(items) = batch else {
        return Err(MalformedBatchError::NotAnArray);
    };
    if items.is_empty() {
        return Err(MalformedBatchError::Empty);
    }

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let Some(fields) = item.as_object() else {
                return Err(MalformedBatchError::NotAnObject(index));
            };
            match fields.get(PAYLOAD_FIELD) {
                None | Some(Value::Null) => return Err(MalformedBatchError::MissingPayload(index)),
                Some(_) => {}
            }
            serde_json::from_value(item).map_err(|e| MalformedBatchError::InvalidMessage {
                index,
                reason: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Msg {
        message: Value,
        #[serde(default)]
        subject: Option<String>,
    }

    #[test]
    fn test_valid_batch() {
        let batch: Vec<Msg> = validate_batch(json!([
            {"message": {"a": 1}, "subject": "hi"},
            {"message": "plain"}
        ]))
        .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].message, json!({"a": 1}));
        assert_eq!(batch[0].subject.as_deref(), Some("hi"));
        assert_eq!(batch[1].message, json!("plain"));
    }

    #[test]
    fn test_rejects_non_array_and_empty() {
        assert_eq!(
            validate_batch::<Msg>(json!({"message": 1})).unwrap_err(),
            MalformedBatchError::NotAnArray
        );
        assert_eq!(validate_batch::<Msg>(json!([])).unwrap_err(), MalformedBatchError::Empty);
    }

    #[test]
    fn test_rejects_missing_or_null_payload() {
        assert_eq!(
            validate_batch::<Msg>(json!([{"message": 1}, {"subject": "x"}])).unwrap_err(),
            MalformedBatchError::MissingPayload(1)
        );
        assert_eq!(
            validate_batch::<Msg>(json!([{"message": null}])).unwrap_err(),
            MalformedBatchError::MissingPayload(0)
        );
        assert_eq!(
            validate_batch::<Msg>(json!([3])).unwrap_err(),
            MalformedBatchError::NotAnObject(0)
        );
    }

    #[test]
    fn test_rejects_wrong_field_types() {
        let err = validate_batch::<Msg>(json!([{"message": 1, "subject": 5}])).unwrap_err();
        assert!(matches!(err, MalformedBatchError::InvalidMessage { index: 0, .. }));
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse_batch::<Msg>(b"not json").unwrap_err();
        assert!(matches!(err, MalformedBatchError::InvalidJson(_)));
    }
}
