//! Handler environment from a `.env` file
//!
//! Variables are collected into a map handed to subprocess handlers; the process
//! environment of the emulator itself is left untouched.

use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::AwsConfig;

/// Variables from `path` plus the AWS region and profile
pub fn load_environment(path: &Path, aws: &AwsConfig) -> HashMap<String, String> {
    let mut environment = HashMap::new();

    match dotenvy::from_path_iter(path) {
        Ok(iter) => {
            for item in iter {
                match item {
                    Ok((key, value)) => {
                        environment.insert(key, value);
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping invalid env line"),
                }
            }
            debug!(path = %path.display(), variables = environment.len(), "Loaded env file");
        }
        Err(e) if e.not_found() => warn!(path = %path.display(), "Env file not found"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to read env file"),
    }

    environment.insert("AWS_REGION".to_string(), aws.region.clone());
    environment.insert("AWS_DEFAULT_REGION".to_string(), aws.region.clone());
    environment.insert("AWS_PROFILE".to_string(), aws.profile.clone());
    environment
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aws() -> AwsConfig {
        AwsConfig {
            region: "eu-central-1".to_string(),
            profile: "dev".to_string(),
        }
    }

    #[test]
    fn test_env_file_and_aws_variables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "TABLE_NAME=users\n# comment\nQUOTED=\"a b\"\nAWS_REGION=ignored\n").unwrap();

        let environment = load_environment(&path, &aws());
        assert_eq!(environment["TABLE_NAME"], "users");
        assert_eq!(environment["QUOTED"], "a b");
        assert_eq!(environment["AWS_REGION"], "eu-central-1");
        assert_eq!(environment["AWS_DEFAULT_REGION"], "eu-central-1");
        assert_eq!(environment["AWS_PROFILE"], "dev");
    }

    #[test]
    fn test_missing_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let environment = load_environment(&dir.path().join("missing.env"), &aws());
        assert_eq!(environment.len(), 3);
    }
}
