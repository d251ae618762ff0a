//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::api::ApiConfig;
use crate::error::{E2eError, E2eResult};
use crate::product_page::PageConfig;
use crate::wait::WaitConfig;
use crate::webdriver::BrowserConfig;

/// Storefront deployment the harness runs against by default
pub const DEFAULT_BASE_URL: &str = "https://opm-website.iot-asm-test1.insitech.live";

/// Complete harness configuration, loadable from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Storefront origin shared by the UI and the API
    pub base_url: String,

    pub api: ApiConfig,

    pub browser: BrowserConfig,

    pub page: PageConfig,

    pub wait: WaitSettings,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api: ApiConfig::default(),
            browser: BrowserConfig::default(),
            page: PageConfig::default(),
            wait: WaitSettings::default(),
        }
    }
}

/// Explicit wait settings handed to every UI wait
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitSettings {
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for WaitSettings {
    fn default() -> Self {
        let defaults = WaitConfig::default();
        Self {
            timeout_ms: defaults.timeout.as_millis() as u64,
            poll_interval_ms: defaults.poll_interval.as_millis() as u64,
        }
    }
}

impl WaitSettings {
    pub fn to_wait_config(self) -> WaitConfig {
        WaitConfig::from_millis(self.timeout_ms, self.poll_interval_ms)
    }
}

impl HarnessConfig {
    /// Parse a config from YAML; missing keys take their defaults
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> E2eResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(E2eError::Config(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.wait.timeout_ms == 0 {
            return Err(E2eError::Config("wait.timeout_ms must be greater than zero".to_string()));
        }
        if self.api.structure_sample == 0 || self.api.validation_sample == 0 {
            return Err(E2eError::Config("api sample sizes must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Base URL without a trailing slash
    pub fn origin(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn product_url(&self) -> String {
        format!("{}{}", self.origin(), self.page.product_path)
    }

    pub fn wait_config(&self) -> WaitConfig {
        self.wait.to_wait_config()
    }
}
