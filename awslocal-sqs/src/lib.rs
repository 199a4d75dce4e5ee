//! SQS delivery mock for awslocal
//!
//! Expands a batch of logical messages into the `Records` envelope a function
//! polling a queue receives, with checksums computed the way SQS does.

pub mod checksum;
pub mod delivery;
pub mod handlers;

pub use checksum::{md5_of_attributes, md5_of_body, ChecksumError};
pub use delivery::{
    build_queue_delivery, QueueMessage, QueueSettings, SqsEvent, SqsMessageAttribute, DEFAULT_QUEUE_NAME,
};
pub use handlers::SqsState;
