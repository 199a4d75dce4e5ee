//! Configuration of the single emulated function

use awslocal_core::AccountRegion;
use std::time::Duration;

pub const DEFAULT_FUNCTION_NAME: &str = "lambdalocal";
pub const DEFAULT_HANDLER: &str = "handler";
pub const DEFAULT_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_MEMORY_MB: u32 = 128;
pub const LATEST_VERSION: &str = "$LATEST";

/// Function configuration
#[derive(Debug, Clone)]
pub struct FunctionConfig {
    pub function_name: String,
    pub version: String,
    pub timeout: Duration,
    /// Explicit memory limit; falls back to available system memory
    pub memory_size: Option<u32>,
    pub account: AccountRegion,
}

impl Default for FunctionConfig {
    fn default() -> Self {
        Self {
            function_name: DEFAULT_FUNCTION_NAME.to_string(),
            version: LATEST_VERSION.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            memory_size: None,
            account: AccountRegion::default(),
        }
    }
}

impl FunctionConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.account.region = region.into();
        self
    }

    /// Get function ARN
    pub fn arn(&self) -> String {
        self.account.function_arn(&self.function_name)
    }

    pub fn log_group_name(&self) -> String {
        format!("/aws/lambda/{}", self.function_name)
    }

    /// Memory limit reported to the handler, in MiB
    pub fn memory_limit_mb(&self) -> u32 {
        self.memory_size
            .or_else(available_memory_mb)
            .unwrap_or(DEFAULT_MEMORY_MB)
    }
}

/// Available system memory in MiB
fn available_memory_mb() -> Option<u32> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/meminfo")
            .ok()
            .and_then(|content| parse_mem_available(&content))
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

fn parse_mem_available(meminfo: &str) -> Option<u32> {
    meminfo
        .lines()
        .find(|line| line.starts_with("MemAvailable:"))
        .and_then(|line| {
            line.split_whitespace()
                .nth(1)
                .and_then(|s| s.parse::<u64>().ok())
                .and_then(|kb| u32::try_from(kb / 1024).ok())
        })
        .filter(|mb| *mb > 0)
}
