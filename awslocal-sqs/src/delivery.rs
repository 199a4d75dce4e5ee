//! Queue message records

use awslocal_core::{AccountRegion, MalformedBatchError};
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

use crate::checksum::{md5_of_attributes, md5_of_body};

pub const DEFAULT_QUEUE_NAME: &str = "awslocal-queue";
const FIFO_SUFFIX: &str = ".fifo";
const SENDER_ID: &str = "AIDAIENQZJOLO23YVJ4VO";

/// Queue the mock records claim to come from
#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub account: AccountRegion,
    pub queue_name: String,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            account: AccountRegion::default(),
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
        }
    }
}

impl QueueSettings {
    pub fn queue_arn(&self, fifo: bool) -> String {
        let name = if fifo && !self.queue_name.ends_with(FIFO_SUFFIX) {
            format!("{}{FIFO_SUFFIX}", self.queue_name)
        } else {
            self.queue_name.clone()
        };
        self.account.arn("sqs", &name)
    }
}

/// Message attribute as the Lambda event carries it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqsMessageAttribute {
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "StringValue")]
    pub string_value: Option<String>,
    /// Base64 encoded
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "BinaryValue")]
    pub binary_value: Option<String>,
    #[serde(default, alias = "StringListValues")]
    pub string_list_values: Vec<String>,
    #[serde(default, alias = "BinaryListValues")]
    pub binary_list_values: Vec<String>,
    #[serde(alias = "DataType")]
    pub data_type: String,
}

/// One element of the input batch
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    pub message: Value,
    #[serde(default, alias = "MessageGroupId")]
    pub message_group_id: Option<String>,
    #[serde(default, alias = "MessageDeduplicationId")]
    pub message_deduplication_id: Option<String>,
    #[serde(default, alias = "MessageAttributes")]
    pub message_attributes: HashMap<String, SqsMessageAttribute>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqsEvent {
    #[serde(rename = "Records")]
    pub records: Vec<SqsEventRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqsEventRecord {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
    pub attributes: SqsRecordAttributes,
    pub message_attributes: HashMap<String, SqsMessageAttribute>,
    pub md5_of_body: String,
    pub md5_of_message_attributes: Option<String>,
    pub event_source: String,
    #[serde(rename = "eventSourceARN")]
    pub event_source_arn: String,
    pub aws_region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SqsRecordAttributes {
    pub approximate_receive_count: String,
    pub sent_timestamp: String,
    pub sender_id: String,
    pub approximate_first_receive_timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_deduplication_id: Option<String>,
}

/// Expand `messages` 1:1, in order, into queue records
///
/// The batch is FIFO when any message carries a group id. A Binary attribute that is not
/// valid base64 rejects the batch.
pub fn build_queue_delivery(
    messages: Vec<QueueMessage>,
    settings: &QueueSettings,
) -> Result<SqsEvent, MalformedBatchError> {
    let fifo = messages.iter().any(|m| m.message_group_id.is_some());
    let queue_arn = settings.queue_arn(fifo);
    let sent_ms = Utc::now().timestamp_millis();

    let mut records = Vec::with_capacity(messages.len());
    for (index, input) in messages.into_iter().enumerate() {
        let body = match input.message {
            Value::String(text) => text,
            other => other.to_string(),
        };
        let md5_of_message_attributes =
            md5_of_attributes(&input.message_attributes).map_err(|e| MalformedBatchError::InvalidMessage {
                index,
                reason: e.to_string(),
            })?;
        let message_id = Uuid::new_v4().to_string();

        let (sequence_number, message_deduplication_id) = if fifo {
            let dedup = input
                .message_deduplication_id
                .unwrap_or_else(|| hex::encode(Sha256::digest(body.as_bytes())));
            (Some(sequence_number(sent_ms, index)), Some(dedup))
        } else {
            (None, None)
        };

        records.push(SqsEventRecord {
            receipt_handle: receipt_handle(&message_id, &body),
            message_id,
            md5_of_body: md5_of_body(&body),
            body,
            attributes: SqsRecordAttributes {
                approximate_receive_count: "1".to_string(),
                sent_timestamp: sent_ms.to_string(),
                sender_id: SENDER_ID.to_string(),
                approximate_first_receive_timestamp: sent_ms.to_string(),
                sequence_number,
                message_group_id: input.message_group_id.filter(|_| fifo),
                message_deduplication_id,
            },
            message_attributes: input.message_attributes,
            md5_of_message_attributes,
            event_source: "aws:sqs".to_string(),
            event_source_arn: queue_arn.clone(),
            aws_region: settings.account.region.clone(),
        });
    }

    Ok(SqsEvent { records })
}

/// 20 digits, increasing with the send time and the position in the batch
fn sequence_number(sent_ms: i64, index: usize) -> String {
    let base = u64::try_from(sent_ms).unwrap_or_default().saturating_mul(1000);
    let offset = u64::try_from(index).unwrap_or(u64::MAX);
    format!("{:020}", base.saturating_add(offset))
}

fn receipt_handle(message_id: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(message_id.as_bytes());
    hasher.update(body.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn messages(batch: Value) -> Vec<QueueMessage> {
        serde_json::from_value(batch).unwrap()
    }

    #[test]
    fn test_standard_queue_batch() {
        let event = build_queue_delivery(
            messages(json!([
                { "message": "hello" },
                { "message": { "n": 2 } },
                { "message": 3 }
            ])),
            &QueueSettings::default(),
        )
        .unwrap();

        assert_eq!(event.records.len(), 3);
        let bodies: Vec<_> = event.records.iter().map(|r| r.body.as_str()).collect();
        assert_eq!(bodies, vec!["hello", r#"{"n":2}"#, "3"]);
        assert_eq!(event.records[0].md5_of_body, "5d41402abc4b2a76b9719d911017c592");

        let ids: HashSet<_> = event.records.iter().map(|r| r.message_id.clone()).collect();
        assert_eq!(ids.len(), 3);

        let value = serde_json::to_value(&event).unwrap();
        let record = &value["Records"][0];
        assert_eq!(record["eventSource"], "aws:sqs");
        assert_eq!(record["eventSourceARN"], "arn:aws:sqs:us-east-1:000000000000:awslocal-queue");
        assert_eq!(record["awsRegion"], "us-east-1");
        assert_eq!(record["md5OfMessageAttributes"], Value::Null);
        assert_eq!(record["attributes"]["ApproximateReceiveCount"], "1");
        assert!(record["attributes"].get("SequenceNumber").is_none());
        assert!(record["attributes"].get("MessageGroupId").is_none());
    }

    #[test]
    fn test_fifo_batch() {
        let event = build_queue_delivery(
            messages(json!([
                { "message": "hello", "messageGroupId": "g1" },
                { "message": "again", "messageDeduplicationId": "d2" }
            ])),
            &QueueSettings::default(),
        )
        .unwrap();

        let first = &event.records[0];
        assert!(first.event_source_arn.ends_with("awslocal-queue.fifo"));
        assert_eq!(first.attributes.message_group_id.as_deref(), Some("g1"));
        assert_eq!(
            first.attributes.message_deduplication_id.as_deref(),
            Some("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
        );
        assert_eq!(first.attributes.sequence_number.as_ref().map(String::len), Some(20));

        let second = &event.records[1];
        assert_eq!(second.attributes.message_deduplication_id.as_deref(), Some("d2"));
        assert!(second.attributes.sequence_number > first.attributes.sequence_number);
    }

    #[test]
    fn test_attributes_pass_through_with_digest() {
        let event = build_queue_delivery(
            messages(json!([{
                "message": "hello",
                "messageAttributes": {
                    "kind": { "stringValue": "greeting", "dataType": "String" },
                    "count": { "StringValue": "42", "DataType": "Number" }
                }
            }])),
            &QueueSettings::default(),
        )
        .unwrap();

        let record = &event.records[0];
        assert_eq!(
            record.md5_of_message_attributes.as_deref(),
            Some("b83fa7d2a32303c0f11fe23d2416101e")
        );
        let value = serde_json::to_value(record).unwrap();
        assert_eq!(
            value["messageAttributes"]["kind"],
            json!({
                "stringValue": "greeting",
                "stringListValues": [],
                "binaryListValues": [],
                "dataType": "String"
            })
        );
    }

    #[test]
    fn test_sequence_number() {
        assert_eq!(sequence_number(1_700_000_000_123, 4), "00001700000000123004");
        assert!(sequence_number(1_700_000_000_123, 5) > sequence_number(1_700_000_000_123, 4));
        assert_eq!(sequence_number(-1, 2), "00000000000000000002");
    }

    #[test]
    fn test_invalid_binary_attribute_rejected() {
        let err = build_queue_delivery(
            messages(json!([
                { "message": "ok" },
                {
                    "message": "x",
                    "messageAttributes": { "b": { "binaryValue": "%%", "dataType": "Binary" } }
                }
            ])),
            &QueueSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, MalformedBatchError::InvalidMessage { index: 1, .. }));
    }
}
