//! Product configuration page object

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::E2eResult;
use crate::locator::Locator;
use crate::wait::{self, WaitConfig};
use crate::webdriver::BrowserDriver;

/// Where the product page lives and how to find its controls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    /// Path and query of the product page, relative to the base URL
    pub product_path: String,

    pub locators: PageLocators,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            product_path: "/constructor?type=2&manufacturer=28&serial=1066&model=7190".to_string(),
            locators: PageLocators::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLocators {
    /// Cookie consent dismiss button
    pub close_cookie: Locator,

    pub add_to_cart: Locator,

    /// Cart badge in the header
    pub cart_button: Locator,

    /// Counter text inside the cart badge
    pub cart_counter: Locator,

    /// Confirmation shown after adding to cart
    pub add_to_cart_notification: Locator,
}

impl Default for PageLocators {
    fn default() -> Self {
        Self {
            close_cookie: Locator::id("close_modal_btn"),
            add_to_cart: Locator::css("#add_to_cart_btn"),
            cart_button: Locator::id("go_to_cart_page_btn"),
            cart_counter: Locator::css("p.MuiTypography-root"),
            add_to_cart_notification: Locator::text("Добавлено в корзину"),
        }
    }
}

/// One fresh read of the cart badge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterRead {
    Value(i64),

    /// Badge or counter element not in the page
    Absent,

    /// Counter element present but its text is not an integer
    Unparseable(String),
}

impl CounterRead {
    /// Parse badge text; blank text means an empty cart
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return CounterRead::Value(0);
        }
        match trimmed.parse::<i64>() {
            Ok(n) => CounterRead::Value(n),
            Err(_) => CounterRead::Unparseable(trimmed.to_string()),
        }
    }

    pub fn or_zero(&self) -> i64 {
        match self {
            CounterRead::Value(n) => *n,
            CounterRead::Absent | CounterRead::Unparseable(_) => 0,
        }
    }
}

/// Page object for the product page
pub struct ProductPage<'a> {
    driver: &'a dyn BrowserDriver,
    url: String,
    locators: &'a PageLocators,
    wait: WaitConfig,
}

impl<'a> ProductPage<'a> {
    pub fn new(driver: &'a dyn BrowserDriver, url: impl Into<String>, locators: &'a PageLocators, wait: WaitConfig) -> Self {
        Self {
            driver,
            url: url.into(),
            locators,
            wait,
        }
    }

    /// Navigate and wait for the add-to-cart control to exist
    pub async fn open(&self) -> E2eResult<()> {
        info!("Opening product page {}", self.url);
        self.driver.goto(&self.url).await?;
        self.wait_for_page_load().await
    }

    pub async fn wait_for_page_load(&self) -> E2eResult<()> {
        wait::wait_for_present(self.driver, &self.locators.add_to_cart, &self.wait).await?;
        Ok(())
    }

    /// Best effort: a missing banner is logged and ignored
    pub async fn dismiss_cookie_banner(&self) -> E2eResult<bool> {
        match wait::wait_for_clickable(self.driver, &self.locators.close_cookie, &self.wait).await {
            Ok(button) => match self.driver.click(&button).await {
                Ok(()) => {
                    debug!("Cookie banner dismissed");
                    Ok(true)
                }
                Err(e) if e.is_stale_element() || e.is_no_such_element() || e.is_click_intercepted() => {
                    warn!("Could not dismiss cookie banner: {}", e);
                    Ok(false)
                }
                Err(e) => Err(e),
            },
            Err(e) if e.is_timeout() => {
                warn!("Could not dismiss cookie banner: {}", e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Read the cart counter without waiting
    pub async fn read_cart_counter(&self) -> E2eResult<CounterRead> {
        let Some(button) = self.driver.find_element(&self.locators.cart_button).await? else {
            return Ok(CounterRead::Absent);
        };
        let counter = match self.driver.find_child(&button, &self.locators.cart_counter).await {
            Ok(Some(counter)) => counter,
            Ok(None) => return Ok(CounterRead::Absent),
            Err(e) if e.is_stale_element() => return Ok(CounterRead::Absent),
            Err(e) => return Err(e),
        };
        match self.driver.text(&counter).await {
            Ok(text) => Ok(CounterRead::parse(&text)),
            Err(e) if e.is_stale_element() || e.is_no_such_element() => Ok(CounterRead::Absent),
            Err(e) => Err(e),
        }
    }

    /// Cart counter, with absent or garbled badges reading as zero
    pub async fn cart_counter(&self) -> E2eResult<i64> {
        let read = self.read_cart_counter().await?;
        if !matches!(read, CounterRead::Value(_)) {
            debug!("Cart counter read as {:?}, using 0", read);
        }
        Ok(read.or_zero())
    }

    /// Click add-to-cart and wait until the counter moves off its prior value
    pub async fn add_to_cart(&self) -> E2eResult<i64> {
        let baseline = self.cart_counter().await?;
        let button = wait::wait_for_clickable(self.driver, &self.locators.add_to_cart, &self.wait).await?;
        self.driver.click(&button).await?;
        let updated = self.wait_for_cart_update(baseline).await?;
        info!("Cart counter {} -> {}", baseline, updated);
        Ok(updated)
    }

    pub async fn wait_for_cart_update(&self, baseline: i64) -> E2eResult<i64> {
        wait::wait_for_change(&self.wait, &baseline, move || self.cart_counter())
            .await?
            .into_result(format!("cart counter to change from {}", baseline))
    }

    pub async fn wait_for_add_to_cart_notification(&self) -> E2eResult<()> {
        wait::wait_for_visible(self.driver, &self.locators.add_to_cart_notification, &self.wait).await?;
        Ok(())
    }

    pub async fn current_url(&self) -> E2eResult<String> {
        self.driver.current_url().await
    }
}
