//! Message checksums
//!
//! `md5OfBody` is the hex MD5 of the body. `md5OfMessageAttributes` digests the
//! attributes sorted by name, each encoded as length-prefixed name and data type,
//! a transport byte, then the length-prefixed value(s).

use base64::Engine;
use md5::{Digest, Md5};
use thiserror::Error;

use crate::delivery::SqsMessageAttribute;

const STRING_TRANSPORT: u8 = 1;
const BINARY_TRANSPORT: u8 = 2;
const STRING_LIST_TRANSPORT: u8 = 3;
const BINARY_LIST_TRANSPORT: u8 = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChecksumError {
    #[error("Attribute {0} has an invalid base64 binary value")]
    InvalidBinary(String),

    #[error("Attribute {0} has a field longer than 4 GiB")]
    TooLong(String),
}

pub fn md5_of_body(body: &str) -> String {
    hex::encode(Md5::digest(body.as_bytes()))
}

/// `None` when there are no attributes
pub fn md5_of_attributes<'a, I>(attributes: I) -> Result<Option<String>, ChecksumError>
where
    I: IntoIterator<Item = (&'a String, &'a SqsMessageAttribute)>,
{
    let mut sorted: Vec<_> = attributes.into_iter().collect();
    if sorted.is_empty() {
        return Ok(None);
    }
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut hasher = Md5::new();
    for (name, attribute) in sorted {
        update_length_prefixed(&mut hasher, name, name.as_bytes())?;
        update_length_prefixed(&mut hasher, name, attribute.data_type.as_bytes())?;

        if let Some(value) = &attribute.string_value {
            hasher.update([STRING_TRANSPORT]);
            update_length_prefixed(&mut hasher, name, value.as_bytes())?;
        } else if let Some(value) = &attribute.binary_value {
            hasher.update([BINARY_TRANSPORT]);
            update_length_prefixed(&mut hasher, name, &decode_binary(name, value)?)?;
        } else if !attribute.string_list_values.is_empty() {
            hasher.update([STRING_LIST_TRANSPORT]);
            for value in &attribute.string_list_values {
                update_length_prefixed(&mut hasher, name, value.as_bytes())?;
            }
        } else if !attribute.binary_list_values.is_empty() {
            hasher.update([BINARY_LIST_TRANSPORT]);
            for value in &attribute.binary_list_values {
                update_length_prefixed(&mut hasher, name, &decode_binary(name, value)?)?;
            }
        }
    }

    Ok(Some(hex::encode(hasher.finalize())))
}

/// Big-endian u32 length followed by the bytes
fn update_length_prefixed(hasher: &mut Md5, name: &str, bytes: &[u8]) -> Result<(), ChecksumError> {
    let len = u32::try_from(bytes.len()).map_err(|_| ChecksumError::TooLong(name.to_string()))?;
    hasher.update(len.to_be_bytes());
    hasher.update(bytes);
    Ok(())
}

fn decode_binary(name: &str, value: &str) -> Result<Vec<u8>, ChecksumError> {
    base64::engine::general_purpose::STANDARD
        .decode(value.as_bytes())
        .map_err(|_| ChecksumError::InvalidBinary(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn string_attr(data_type: &str, value: &str) -> SqsMessageAttribute {
        SqsMessageAttribute {
            data_type: data_type.to_string(),
            string_value: Some(value.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_md5_of_body() {
        assert_eq!(md5_of_body("hello"), "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn test_md5_of_string_attributes_is_order_independent() {
        let mut attributes = HashMap::new();
        attributes.insert("kind".to_string(), string_attr("String", "greeting"));
        attributes.insert("count".to_string(), string_attr("Number", "42"));

        assert_eq!(
            md5_of_attributes(&attributes).unwrap().as_deref(),
            Some("b83fa7d2a32303c0f11fe23d2416101e")
        );
    }

    #[test]
    fn test_md5_of_binary_attribute() {
        let mut attributes = HashMap::new();
        attributes.insert(
            "blob".to_string(),
            SqsMessageAttribute {
                data_type: "Binary".to_string(),
                binary_value: Some("aGk=".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(
            md5_of_attributes(&attributes).unwrap().as_deref(),
            Some("a680c628e296cf6dc14c150020825221")
        );

        attributes.get_mut("blob").unwrap().binary_value = Some("not base64!".to_string());
        assert_eq!(
            md5_of_attributes(&attributes),
            Err(ChecksumError::InvalidBinary("blob".to_string()))
        );
    }

    #[test]
    fn test_no_attributes() {
        let attributes: HashMap<String, SqsMessageAttribute> = HashMap::new();
        assert_eq!(md5_of_attributes(&attributes).unwrap(), None);
    }
}
