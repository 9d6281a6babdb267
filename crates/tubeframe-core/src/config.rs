//! Loader configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Default location of the player runtime script
pub const DEFAULT_SCRIPT_URL: &str = "https://www.youtube.com/iframe_api";

/// SDK loader configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkConfig {
    /// Script inserted into the document when no runtime is installed
    pub script_url: Url,
}

impl SdkConfig {
    /// Load the runtime from a different location, e.g. a self-hosted mirror
    pub fn with_script_url(url: &str) -> Result<Self> {
        let script_url = Url::parse(url)
            .map_err(|e| Error::InvalidConfig(format!("script url `{url}`: {e}")))?;

        match script_url.scheme() {
            "http" | "https" => Ok(Self { script_url }),
            scheme => Err(Error::InvalidConfig(format!(
                "script url must be http(s), got `{scheme}`"
            ))),
        }
    }
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            script_url: Url::parse(DEFAULT_SCRIPT_URL).expect("default script url is valid"),
        }
    }
}
