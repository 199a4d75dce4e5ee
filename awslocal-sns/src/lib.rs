//! SNS delivery mock for awslocal
//!
//! Expands a batch of logical messages into the `Records` envelope a function
//! subscribed to a topic receives.

pub mod delivery;
pub mod handlers;

pub use delivery::{build_topic_delivery, SnsEvent, TopicMessage, TopicSettings, DEFAULT_TOPIC_NAME};
pub use handlers::SnsState;
