//! Topic notification records

use awslocal_core::AccountRegion;
use base64::Engine;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

pub const DEFAULT_TOPIC_NAME: &str = "awslocal-topic";

/// Topic the mock records claim to come from
#[derive(Debug, Clone)]
pub struct TopicSettings {
    pub account: AccountRegion,
    pub topic_name: String,
}

impl Default for TopicSettings {
    fn default() -> Self {
        Self {
            account: AccountRegion::default(),
            topic_name: DEFAULT_TOPIC_NAME.to_string(),
        }
    }
}

impl TopicSettings {
    pub fn topic_arn(&self) -> String {
        self.account.arn("sns", &self.topic_name)
    }
}

/// Message attribute in notification form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnsMessageAttribute {
    #[serde(rename = "Type", alias = "type", alias = "dataType", alias = "DataType")]
    pub data_type: String,
    #[serde(rename = "Value", alias = "value", alias = "stringValue", alias = "StringValue")]
    pub value: String,
}

/// One element of the input batch
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicMessage {
    pub message: Value,
    #[serde(default, alias = "Subject")]
    pub subject: Option<String>,
    #[serde(default, alias = "MessageAttributes")]
    pub message_attributes: HashMap<String, SnsMessageAttribute>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnsEvent {
    #[serde(rename = "Records")]
    pub records: Vec<SnsEventRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SnsEventRecord {
    pub event_source: String,
    pub event_version: String,
    pub event_subscription_arn: String,
    pub sns: SnsNotification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SnsNotification {
    #[serde(rename = "Type")]
    pub notification_type: String,
    pub message_id: String,
    pub topic_arn: String,
    pub subject: Option<String>,
    pub message: String,
    pub timestamp: String,
    pub signature_version: String,
    pub signature: String,
    pub signing_cert_url: String,
    pub unsubscribe_url: String,
    pub message_attributes: HashMap<String, SnsMessageAttribute>,
}

/// Expand `messages` 1:1, in order, into notification records
pub fn build_topic_delivery(messages: Vec<TopicMessage>, settings: &TopicSettings) -> SnsEvent {
    let topic_arn = settings.topic_arn();
    let region = &settings.account.region;

    let records = messages
        .into_iter()
        .map(|input| {
            let message = match input.message {
                Value::String(text) => text,
                other => other.to_string(),
            };
            let subscription_arn = format!("{topic_arn}:{}", Uuid::new_v4());

            SnsEventRecord {
                event_source: "aws:sns".to_string(),
                event_version: "1.0".to_string(),
                event_subscription_arn: subscription_arn.clone(),
                sns: SnsNotification {
                    notification_type: "Notification".to_string(),
                    message_id: Uuid::new_v4().to_string(),
                    topic_arn: topic_arn.clone(),
                    subject: input.subject,
                    signature: signature(&message),
                    message,
                    timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                    signature_version: "1".to_string(),
                    signing_cert_url: format!(
                        "https://sns.{region}.amazonaws.com/SimpleNotificationService-{}.pem",
                        Uuid::new_v4().simple()
                    ),
                    unsubscribe_url: format!(
                        "https://sns.{region}.amazonaws.com/?Action=Unsubscribe&SubscriptionArn={subscription_arn}"
                    ),
                    message_attributes: input.message_attributes,
                },
            }
        })
        .collect();

    SnsEvent { records }
}

/// Stand-in signature: base64 SHA-256 of the message
fn signature(message: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(Sha256::digest(message.as_bytes()))
}
