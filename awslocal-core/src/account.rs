//! Account and region used when synthesizing ARNs

pub const DEFAULT_ACCOUNT_ID: &str = "000000000000";
pub const DEFAULT_REGION: &str = "us-east-1";

/// Account/region pair every emulated resource lives under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountRegion {
    pub account_id: String,
    pub region: String,
}

impl AccountRegion {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            account_id: DEFAULT_ACCOUNT_ID.to_string(),
            region: region.into(),
        }
    }

    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = account_id.into();
        self
    }

    /// `arn:aws:<service>:<region>:<account>:<resource>`
    pub fn arn(&self, service: &str, resource: &str) -> String {
        format!("arn:aws:{}:{}:{}:{}", service, self.region, self.account_id, resource)
    }

    pub fn function_arn(&self, function_name: &str) -> String {
        self.arn("lambda", &format!("function:{function_name}"))
    }
}

impl Default for AccountRegion {
    fn default() -> Self {
        Self::new(DEFAULT_REGION)
    }
}
