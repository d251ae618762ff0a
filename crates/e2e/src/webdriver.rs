//! Browser automation over the W3C WebDriver protocol
//!
//! The harness only needs a handful of commands, so this talks to
//! chromedriver/geckodriver directly with `reqwest` instead of pulling in a
//! full client. Waiting is never delegated to the driver: the implicit
//! timeout is forced to zero and all synchronization goes through
//! [`crate::wait`].

use std::time::Duration;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult, NO_SUCH_ELEMENT};
use crate::locator::Locator;

/// Key under which W3C drivers return element references
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Opaque reference to an element in the current page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(pub String);

impl ElementRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Rendered bounding box of an element
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementRect {
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// The browser operations the harness consumes
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn goto(&self, url: &str) -> E2eResult<()>;

    async fn current_url(&self) -> E2eResult<String>;

    /// `Ok(None)` when nothing matches
    async fn find_element(&self, locator: &Locator) -> E2eResult<Option<ElementRef>>;

    /// Search within `parent`, `Ok(None)` when nothing matches
    async fn find_child(&self, parent: &ElementRef, locator: &Locator) -> E2eResult<Option<ElementRef>>;

    async fn click(&self, element: &ElementRef) -> E2eResult<()>;

    async fn text(&self, element: &ElementRef) -> E2eResult<String>;

    async fn is_displayed(&self, element: &ElementRef) -> E2eResult<bool>;

    async fn is_enabled(&self, element: &ElementRef) -> E2eResult<bool>;

    async fn rect(&self, element: &ElementRef) -> E2eResult<ElementRect>;

    /// End the browser session
    async fn quit(&self) -> E2eResult<()>;
}

/// Creates an exclusive browser for one test case
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> E2eResult<Box<dyn BrowserDriver>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserKind {
    #[default]
    Chrome,
    Firefox,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chrome => "chrome",
            BrowserKind::Firefox => "firefox",
        }
    }
}

impl std::str::FromStr for BrowserKind {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chrome" | "chromium" => Ok(BrowserKind::Chrome),
            "firefox" => Ok(BrowserKind::Firefox),
            other => Err(E2eError::Config(format!("Unsupported browser: {}", other))),
        }
    }
}

/// Configuration for the WebDriver endpoint and browser
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Base URL of chromedriver / geckodriver
    pub webdriver_url: String,

    pub browser: BrowserKind,

    pub headless: bool,

    /// Extra command-line arguments for the browser
    pub args: Vec<String>,

    /// Page load timeout enforced by the driver
    pub page_load_timeout_ms: u64,

    /// Timeout for each WebDriver HTTP command
    pub command_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://127.0.0.1:9515".to_string(),
            browser: BrowserKind::Chrome,
            headless: false,
            args: vec!["--start-maximized".to_string()],
            page_load_timeout_ms: 30_000,
            command_timeout_ms: 60_000,
        }
    }
}

impl BrowserConfig {
    /// W3C capabilities for a new session
    pub fn capabilities(&self) -> Value {
        let mut args = self.args.clone();
        match self.browser {
            BrowserKind::Chrome => {
                if self.headless {
                    args.push("--headless=new".to_string());
                }
                json!({
                    "capabilities": {
                        "alwaysMatch": {
                            "browserName": "chrome",
                            "goog:chromeOptions": { "args": args }
                        }
                    }
                })
            }
            BrowserKind::Firefox => {
                if self.headless {
                    args.push("-headless".to_string());
                }
                json!({
                    "capabilities": {
                        "alwaysMatch": {
                            "browserName": "firefox",
                            "moz:firefoxOptions": { "args": args }
                        }
                    }
                })
            }
        }
    }
}

/// A live WebDriver session
pub struct WebDriverSession {
    client: reqwest::Client,
    endpoint: String,
    session_id: String,
}

impl WebDriverSession {
    /// Create a session and disable the driver's implicit wait
    pub async fn start(config: &BrowserConfig) -> E2eResult<Self> {
        let endpoint = config.webdriver_url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.command_timeout_ms))
            .build()?;

        info!("Starting {} session via {}", config.browser.as_str(), endpoint);

        let created = send_command(&client, Method::POST, &format!("{}/session", endpoint), Some(config.capabilities()))
            .await
            .map_err(|e| E2eError::SessionStartup(e.to_string()))?;

        let session_id = created
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| E2eError::SessionStartup(format!("No sessionId in response: {}", created)))?
            .to_string();

        let session = Self {
            client,
            endpoint,
            session_id,
        };

        session
            .command(
                Method::POST,
                "/timeouts",
                Some(json!({ "implicit": 0, "pageLoad": config.page_load_timeout_ms })),
            )
            .await?;

        debug!("WebDriver session {} ready", session.session_id);
        Ok(session)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> E2eResult<Value> {
        let url = format!("{}/session/{}{}", self.endpoint, self.session_id, path);
        send_command(&self.client, method, &url, body).await
    }

    async fn element_query(&self, path: String, locator: &Locator) -> E2eResult<Option<ElementRef>> {
        let (using, value) = locator.strategy();
        match self.command(Method::POST, &path, Some(json!({ "using": using, "value": value }))).await {
            Ok(found) => parse_element_ref(&found).map(Some),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn element_path(element: &ElementRef, suffix: &str) -> String {
        format!("/element/{}{}", element.as_str(), suffix)
    }
}

#[async_trait]
impl BrowserDriver for WebDriverSession {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        debug!("Navigating to {}", url);
        self.command(Method::POST, "/url", Some(json!({ "url": url }))).await?;
        Ok(())
    }

    async fn current_url(&self) -> E2eResult<String> {
        let value = self.command(Method::GET, "/url", None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| E2eError::MalformedData(format!("Current URL is not a string: {}", value)))
    }

    async fn find_element(&self, locator: &Locator) -> E2eResult<Option<ElementRef>> {
        self.element_query("/element".to_string(), locator).await
    }

    async fn find_child(&self, parent: &ElementRef, locator: &Locator) -> E2eResult<Option<ElementRef>> {
        self.element_query(Self::element_path(parent, "/element"), locator).await
    }

    async fn click(&self, element: &ElementRef) -> E2eResult<()> {
        self.command(Method::POST, &Self::element_path(element, "/click"), Some(json!({})))
            .await?;
        Ok(())
    }

    async fn text(&self, element: &ElementRef) -> E2eResult<String> {
        let value = self.command(Method::GET, &Self::element_path(element, "/text"), None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn is_displayed(&self, element: &ElementRef) -> E2eResult<bool> {
        let value = self.command(Method::GET, &Self::element_path(element, "/displayed"), None).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_enabled(&self, element: &ElementRef) -> E2eResult<bool> {
        let value = self.command(Method::GET, &Self::element_path(element, "/enabled"), None).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn rect(&self, element: &ElementRef) -> E2eResult<ElementRect> {
        let value = self.command(Method::GET, &Self::element_path(element, "/rect"), None).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn quit(&self) -> E2eResult<()> {
        info!("Closing browser session {}", self.session_id);
        self.command(Method::DELETE, "", None).await?;
        Ok(())
    }
}

/// Starts a fresh [`WebDriverSession`] per case
pub struct WebDriverLauncher {
    config: BrowserConfig,
}

impl WebDriverLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self) -> E2eResult<Box<dyn BrowserDriver>> {
        let session = WebDriverSession::start(&self.config).await?;
        Ok(Box::new(session))
    }
}

async fn send_command(
    client: &reqwest::Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> E2eResult<Value> {
    let mut request = client.request(method.clone(), url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;

    let mut payload: Value = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text)?
    };
    let value = payload.get_mut("value").map(Value::take).unwrap_or(Value::Null);

    if status.is_success() {
        Ok(value)
    } else {
        let err = webdriver_error(status, &value);
        if !err.is_no_such_element() {
            warn!("WebDriver {} {} failed: {}", method, url, err);
        }
        Err(err)
    }
}

fn webdriver_error(status: StatusCode, value: &Value) -> E2eError {
    let error = value
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            if status == StatusCode::NOT_FOUND {
                NO_SUCH_ELEMENT.to_string()
            } else {
                format!("http {}", status.as_u16())
            }
        });
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    E2eError::WebDriver { error, message }
}

fn parse_element_ref(value: &Value) -> E2eResult<ElementRef> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(|id| ElementRef(id.to_string()))
        .ok_or_else(|| E2eError::MalformedData(format!("Not an element reference: {}", value)))
}
