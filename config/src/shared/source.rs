use secrecy::SecretString;
use serde::Deserialize;

use crate::shared::ValidationError;

const fn default_page_size() -> u32 {
    100
}

/// Connection settings for the HTTP tabular source.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SourceConfig {
    /// Base url under which every table is exposed as `{base_url}/{table}`.
    pub base_url: String,
    /// Bearer token sent with every request. Redacted in debug output.
    pub api_key: SecretString,
    /// Number of records requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl SourceConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ValidationError::InvalidSourceUrl(self.base_url.clone()));
        }

        if self.page_size == 0 {
            return Err(ValidationError::ZeroValue("source.page_size"));
        }

        Ok(())
    }
}
