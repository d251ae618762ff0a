//! Shared fixtures: an in-process shops API and a scripted storefront page
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use storefront_e2e::error::{E2eError, E2eResult, STALE_ELEMENT};
use storefront_e2e::locator::Locator;
use storefront_e2e::product_page::PageLocators;
use storefront_e2e::webdriver::{BrowserDriver, BrowserLauncher, ElementRect, ElementRef};

// ----------------------------------------------------------------------------
// Shops API stub
// ----------------------------------------------------------------------------

pub fn shop(id: u64, name: &str) -> Value {
    json!({
        "id": id,
        "partnerId": 100 + id,
        "name": name,
        "longitude": 37.6 + id as f64 / 100.0,
        "latitude": 55.7,
        "address": format!("Moscow, street {}", id),
        "workTime": "10:00 - 22:00",
        "quantity": id % 4,
        "existThing": true,
        "needPromocode": id % 2 == 0
    })
}

/// Twelve generic shops followed by the two the suite looks for by name
pub fn default_shops() -> Vec<Value> {
    let mut shops: Vec<Value> = (1..=12).map(|i| shop(i, &format!("Shop {}", i))).collect();
    shops.push(shop(13, "Билайн Калейдоскоп"));
    shops.push(shop(14, "М.Видео Авеню Юго-Западная"));
    shops
}

struct StubState {
    shops: Vec<Value>,
    delay: Option<Duration>,
}

pub struct StubApi {
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl Drop for StubApi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl StubApi {
    pub async fn spawn(shops: Vec<Value>) -> Self {
        Self::spawn_with_delay(shops, None).await
    }

    pub async fn spawn_with_delay(shops: Vec<Value>, delay: Option<Duration>) -> Self {
        let state = Arc::new(StubState { shops, delay });
        let app = Router::new()
            .route("/api/map/shops", post(list_shops))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            handle,
        }
    }
}

fn reject(status: StatusCode, reason: &str) -> Response {
    (status, Json(json!({ "error": reason }))).into_response()
}

/// Mirrors the listing contract: 401, then 415, then 400, else 200
async fn list_shops(State(state): State<Arc<StubState>>, headers: HeaderMap, body: Bytes) -> Response {
    if !headers.contains_key(header::ORIGIN) {
        return reject(StatusCode::UNAUTHORIZED, "missing origin");
    }

    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false);
    if !is_json {
        return reject(StatusCode::UNSUPPORTED_MEDIA_TYPE, "expected application/json");
    }

    let filter: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return reject(StatusCode::BAD_REQUEST, "invalid json"),
    };
    let Some(filter) = filter.as_object() else {
        return reject(StatusCode::BAD_REQUEST, "filter must be an object");
    };
    for (key, value) in filter {
        match key.as_str() {
            "pageSize" | "page" => {
                if !value.as_u64().map(|n| n > 0).unwrap_or(false) {
                    return reject(StatusCode::BAD_REQUEST, "paging fields must be positive integers");
                }
            }
            _ => return reject(StatusCode::BAD_REQUEST, "unknown filter field"),
        }
    }

    if let Some(delay) = state.delay {
        tokio::time::sleep(delay).await;
    }
    Json(Value::Array(state.shops.clone())).into_response()
}

// ----------------------------------------------------------------------------
// Scripted storefront page
// ----------------------------------------------------------------------------

const COOKIE: &str = "close-cookie";
const ADD_TO_CART: &str = "add-to-cart";
const CART_BUTTON: &str = "cart-button";
const CART_COUNTER: &str = "cart-counter";
const NOTIFICATION: &str = "notification";

#[derive(Debug, Clone)]
pub struct PageScript {
    /// Cookie banner shown on load
    pub cookie_banner: bool,

    /// Initial counter text, `None` when the counter element is missing
    pub counter_text: Option<String>,

    /// Whether add-to-cart actually changes the counter
    pub increments: bool,

    /// Delay between the click and the counter/notification update
    pub update_delay: Duration,

    /// Whether the confirmation ever shows up
    pub notification: bool,

    /// WebDriver error code the cookie dismiss click fails with
    pub cookie_click_error: Option<&'static str>,
}

impl Default for PageScript {
    fn default() -> Self {
        Self {
            cookie_banner: true,
            counter_text: Some(String::new()),
            increments: true,
            update_delay: Duration::from_millis(1200),
            notification: true,
            cookie_click_error: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct PageState {
    pub url: Option<String>,
    pub cookie_banner: bool,
    pub counter_text: Option<String>,
    pub pending_update: Option<Instant>,
    pub notification_visible_at: Option<Instant>,
    pub clicks: Vec<String>,
    pub quit: bool,
}

#[derive(Clone)]
pub struct FakeStorefront {
    script: PageScript,
    locators: PageLocators,
    pub state: Arc<Mutex<PageState>>,
}

impl FakeStorefront {
    pub fn new(script: PageScript) -> Self {
        let state = PageState {
            cookie_banner: script.cookie_banner,
            counter_text: script.counter_text.clone(),
            ..Default::default()
        };
        Self {
            script,
            locators: PageLocators::default(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn locators(&self) -> &PageLocators {
        &self.locators
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn was_quit(&self) -> bool {
        self.state.lock().unwrap().quit
    }

    /// Apply a scheduled counter update once its time has come
    fn settle(&self, state: &mut PageState) {
        if let Some(at) = state.pending_update {
            if Instant::now() >= at {
                let current = state
                    .counter_text
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .and_then(|t| t.parse::<i64>().ok())
                    .unwrap_or(0);
                state.counter_text = Some((current + 1).to_string());
                state.pending_update = None;
            }
        }
    }

    fn resolve(&self, locator: &Locator, state: &PageState) -> Option<&'static str> {
        state.url.as_ref()?;
        if *locator == self.locators.close_cookie {
            state.cookie_banner.then_some(COOKIE)
        } else if *locator == self.locators.add_to_cart {
            Some(ADD_TO_CART)
        } else if *locator == self.locators.cart_button {
            Some(CART_BUTTON)
        } else if *locator == self.locators.add_to_cart_notification {
            state
                .notification_visible_at
                .filter(|at| Instant::now() >= *at)
                .map(|_| NOTIFICATION)
        } else {
            None
        }
    }
}

#[async_trait]
impl BrowserDriver for FakeStorefront {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.state.lock().unwrap().url = Some(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> E2eResult<String> {
        Ok(self.state.lock().unwrap().url.clone().unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn find_element(&self, locator: &Locator) -> E2eResult<Option<ElementRef>> {
        let mut state = self.state.lock().unwrap();
        self.settle(&mut state);
        Ok(self.resolve(locator, &state).map(|id| ElementRef(id.to_string())))
    }

    async fn find_child(&self, parent: &ElementRef, locator: &Locator) -> E2eResult<Option<ElementRef>> {
        let mut state = self.state.lock().unwrap();
        self.settle(&mut state);
        if parent.as_str() == CART_BUTTON && *locator == self.locators.cart_counter && state.counter_text.is_some() {
            return Ok(Some(ElementRef(CART_COUNTER.to_string())));
        }
        Ok(None)
    }

    async fn click(&self, element: &ElementRef) -> E2eResult<()> {
        let mut state = self.state.lock().unwrap();
        state.clicks.push(element.as_str().to_string());
        match element.as_str() {
            COOKIE => {
                if let Some(code) = self.script.cookie_click_error {
                    return Err(E2eError::WebDriver {
                        error: code.to_string(),
                        message: "cookie banner click failed".to_string(),
                    });
                }
                if !state.cookie_banner {
                    return Err(E2eError::WebDriver {
                        error: STALE_ELEMENT.to_string(),
                        message: "banner already closed".to_string(),
                    });
                }
                state.cookie_banner = false;
            }
            ADD_TO_CART => {
                let at = Instant::now() + self.script.update_delay;
                if self.script.increments {
                    state.pending_update = Some(at);
                }
                if self.script.notification {
                    state.notification_visible_at = Some(at);
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn text(&self, element: &ElementRef) -> E2eResult<String> {
        let mut state = self.state.lock().unwrap();
        self.settle(&mut state);
        match element.as_str() {
            CART_COUNTER => Ok(state.counter_text.clone().unwrap_or_default()),
            NOTIFICATION => Ok("Добавлено в корзину".to_string()),
            _ => Ok(String::new()),
        }
    }

    async fn is_displayed(&self, _element: &ElementRef) -> E2eResult<bool> {
        Ok(true)
    }

    async fn is_enabled(&self, _element: &ElementRef) -> E2eResult<bool> {
        Ok(true)
    }

    async fn rect(&self, _element: &ElementRef) -> E2eResult<ElementRect> {
        Ok(ElementRect {
            x: 10.0,
            y: 10.0,
            width: 120.0,
            height: 32.0,
        })
    }

    async fn quit(&self) -> E2eResult<()> {
        self.state.lock().unwrap().quit = true;
        Ok(())
    }
}

/// Hands out a fresh scripted page per launch and remembers each one
#[derive(Clone)]
pub struct FakeLauncher {
    script: PageScript,
    pub launched: Arc<Mutex<Vec<FakeStorefront>>>,
}

impl FakeLauncher {
    pub fn new(script: PageScript) -> Self {
        Self {
            script,
            launched: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn launched(&self) -> Vec<FakeStorefront> {
        self.launched.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> E2eResult<Box<dyn BrowserDriver>> {
        let page = FakeStorefront::new(self.script.clone());
        self.launched.lock().unwrap().push(page.clone());
        Ok(Box::new(page))
    }
}
