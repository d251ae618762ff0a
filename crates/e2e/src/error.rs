//! Error types for storefront E2E checks

use thiserror::Error;

/// WebDriver error code for a lookup that matched nothing
pub const NO_SUCH_ELEMENT: &str = "no such element";

/// WebDriver error code for an element detached from the DOM
pub const STALE_ELEMENT: &str = "stale element reference";

/// WebDriver error code for a click that landed on another element
pub const ELEMENT_CLICK_INTERCEPTED: &str = "element click intercepted";

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Browser session failed to start: {0}")]
    SessionStartup(String),

    #[error("WebDriver error: {error} - {message}")]
    WebDriver { error: String, message: String },

    #[error("Timeout after {timeout_ms} ms waiting for: {what}")]
    Timeout { what: String, timeout_ms: u64 },

    #[error("Case '{case}': expected status {expected}, got {actual}")]
    ContractMismatch {
        case: String,
        expected: u16,
        actual: u16,
    },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Malformed data: {0}")]
    MalformedData(String),

    #[error("Case table parse error: {0}")]
    CaseTable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// True for a WebDriver lookup that found nothing
    pub fn is_no_such_element(&self) -> bool {
        matches!(self, E2eError::WebDriver { error, .. } if error == NO_SUCH_ELEMENT)
    }

    /// True when the referenced element is no longer attached to the page
    pub fn is_stale_element(&self) -> bool {
        matches!(self, E2eError::WebDriver { error, .. } if error == STALE_ELEMENT)
    }

    pub fn is_click_intercepted(&self) -> bool {
        matches!(self, E2eError::WebDriver { error, .. } if error == ELEMENT_CLICK_INTERCEPTED)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, E2eError::Timeout { .. })
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
