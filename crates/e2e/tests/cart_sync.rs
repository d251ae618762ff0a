//! Add-to-cart synchronization against a scripted storefront page
//!
//! Runs on paused tokio time so deadlines and UI delays are deterministic.

mod support;

use std::time::Duration;
use test_case::test_case;
use tokio::time::Instant;

use storefront_e2e::product_page::{CounterRead, ProductPage};
use storefront_e2e::runner::{TAG_UI, TestRunner};
use storefront_e2e::error::{ELEMENT_CLICK_INTERCEPTED, STALE_ELEMENT};
use storefront_e2e::{E2eError, HarnessConfig, WaitConfig};
use support::{FakeLauncher, FakeStorefront, PageScript};

const PRODUCT_URL: &str = "https://shop.test/constructor?type=2";

fn wait() -> WaitConfig {
    WaitConfig::from_millis(5000, 500)
}

async fn opened(page: &ProductPage<'_>) {
    page.open().await.unwrap();
    assert!(page.dismiss_cookie_banner().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn add_to_cart_from_empty_reaches_one() {
    let fake = FakeStorefront::new(PageScript::default());
    let page = ProductPage::new(&fake, PRODUCT_URL, fake.locators(), wait());
    opened(&page).await;

    assert_eq!(page.cart_counter().await.unwrap(), 0);

    let start = Instant::now();
    let updated = page.add_to_cart().await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(updated, 1);
    assert_eq!(page.cart_counter().await.unwrap(), 1);
    // Counter flips at 1200 ms; the next poll lands on 1500 ms
    assert_eq!(elapsed, Duration::from_millis(1500));
    assert_eq!(fake.clicks(), vec!["close-cookie", "add-to-cart"]);
    assert_eq!(page.current_url().await.unwrap(), PRODUCT_URL);
}

#[tokio::test(start_paused = true)]
async fn add_to_cart_without_effect_times_out() {
    let fake = FakeStorefront::new(PageScript {
        increments: false,
        ..Default::default()
    });
    let page = ProductPage::new(&fake, PRODUCT_URL, fake.locators(), wait());
    opened(&page).await;

    let err = page.add_to_cart().await.unwrap_err();
    match err {
        E2eError::Timeout { what, timeout_ms } => {
            assert!(what.contains("cart counter to change from 0"));
            assert_eq!(timeout_ms, 5000);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn unchanged_counter_already_at_target_is_not_success() {
    // The baseline already reads 1; without a real change the wait must not pass at t=0
    let fake = FakeStorefront::new(PageScript {
        counter_text: Some("1".to_string()),
        increments: false,
        ..Default::default()
    });
    let page = ProductPage::new(&fake, PRODUCT_URL, fake.locators(), wait());
    opened(&page).await;

    let start = Instant::now();
    let result = page.wait_for_cart_update(1).await;
    assert!(result.unwrap_err().is_timeout());
    assert!(start.elapsed() >= Duration::from_millis(5000));
}

#[tokio::test(start_paused = true)]
async fn absent_counter_reads_zero() {
    let fake = FakeStorefront::new(PageScript {
        counter_text: None,
        ..Default::default()
    });
    let page = ProductPage::new(&fake, PRODUCT_URL, fake.locators(), wait());
    opened(&page).await;

    assert_eq!(page.read_cart_counter().await.unwrap(), CounterRead::Absent);
    assert_eq!(page.cart_counter().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn counter_before_page_load_reads_zero() {
    let fake = FakeStorefront::new(PageScript::default());
    let page = ProductPage::new(&fake, PRODUCT_URL, fake.locators(), wait());

    assert_eq!(page.read_cart_counter().await.unwrap(), CounterRead::Absent);
    assert_eq!(page.cart_counter().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn garbled_counter_is_tagged_and_reads_zero() {
    let fake = FakeStorefront::new(PageScript {
        counter_text: Some("99+".to_string()),
        ..Default::default()
    });
    let page = ProductPage::new(&fake, PRODUCT_URL, fake.locators(), wait());
    opened(&page).await;

    assert_eq!(
        page.read_cart_counter().await.unwrap(),
        CounterRead::Unparseable("99+".to_string())
    );
    assert_eq!(page.cart_counter().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_cookie_banner_is_not_fatal() {
    let fake = FakeStorefront::new(PageScript {
        cookie_banner: false,
        ..Default::default()
    });
    let page = ProductPage::new(&fake, PRODUCT_URL, fake.locators(), wait());
    page.open().await.unwrap();

    assert!(!page.dismiss_cookie_banner().await.unwrap());
    assert_eq!(page.add_to_cart().await.unwrap(), 1);
}

#[test_case(STALE_ELEMENT; "stale banner")]
#[test_case(ELEMENT_CLICK_INTERCEPTED; "click intercepted")]
#[tokio::test(start_paused = true)]
async fn failed_banner_click_is_not_fatal(code: &'static str) {
    let fake = FakeStorefront::new(PageScript {
        cookie_click_error: Some(code),
        ..Default::default()
    });
    let page = ProductPage::new(&fake, PRODUCT_URL, fake.locators(), wait());
    page.open().await.unwrap();

    assert!(!page.dismiss_cookie_banner().await.unwrap());
    assert_eq!(page.add_to_cart().await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn unexpected_banner_click_error_propagates() {
    let fake = FakeStorefront::new(PageScript {
        cookie_click_error: Some("unknown error"),
        ..Default::default()
    });
    let page = ProductPage::new(&fake, PRODUCT_URL, fake.locators(), wait());
    page.open().await.unwrap();

    match page.dismiss_cookie_banner().await.unwrap_err() {
        E2eError::WebDriver { error, .. } => assert_eq!(error, "unknown error"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn notification_becomes_visible_after_add() {
    let fake = FakeStorefront::new(PageScript::default());
    let page = ProductPage::new(&fake, PRODUCT_URL, fake.locators(), wait());
    opened(&page).await;

    page.add_to_cart().await.unwrap();
    page.wait_for_add_to_cart_notification().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn missing_notification_times_out() {
    let fake = FakeStorefront::new(PageScript {
        notification: false,
        ..Default::default()
    });
    let page = ProductPage::new(&fake, PRODUCT_URL, fake.locators(), wait());
    opened(&page).await;

    page.add_to_cart().await.unwrap();
    let err = page.wait_for_add_to_cart_notification().await.unwrap_err();
    assert!(err.to_string().contains("visibility of text=Добавлено в корзину"));
}

fn ui_config() -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.base_url = "https://shop.test".to_string();
    config.wait.timeout_ms = 5000;
    config
}

#[tokio::test(start_paused = true)]
async fn runner_ui_cases_use_one_browser_each() {
    let launcher = FakeLauncher::new(PageScript::default());
    let mut runner = TestRunner::with_launcher(ui_config(), Box::new(launcher.clone()));

    let results = runner.run_tagged(TAG_UI).await.unwrap();
    assert_eq!(results.total, 2);
    assert_eq!(results.failed, 0, "{:?}", results.results);

    let launched = launcher.launched();
    assert_eq!(launched.len(), 2);
    assert!(launched.iter().all(|page| page.was_quit()));
}

#[tokio::test(start_paused = true)]
async fn runner_ui_case_survives_stale_cookie_banner() {
    let launcher = FakeLauncher::new(PageScript {
        cookie_click_error: Some(STALE_ELEMENT),
        ..Default::default()
    });
    let mut runner = TestRunner::with_launcher(ui_config(), Box::new(launcher.clone()));

    let result = runner.run_test("cart_counter").await.unwrap();
    assert!(result.success, "{:?}", result.error);
    assert!(launcher.launched()[0].was_quit());
}

#[tokio::test(start_paused = true)]
async fn runner_ui_failure_still_closes_browser() {
    let launcher = FakeLauncher::new(PageScript {
        increments: false,
        ..Default::default()
    });
    let mut runner = TestRunner::with_launcher(ui_config(), Box::new(launcher.clone()));

    let result = runner.run_test("cart_counter").await.unwrap();
    assert!(!result.success);
    assert!(result.error.unwrap().contains("Timeout"));

    let launched = launcher.launched();
    assert_eq!(launched.len(), 1);
    assert!(launched[0].was_quit());
}
