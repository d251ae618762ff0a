//! Storefront E2E verification harness
//!
//! This crate checks the storefront from the outside:
//! - Drives a browser through the product page's add-to-cart flow over WebDriver
//! - Synchronizes assertions with the UI through explicit polling waits
//! - Runs a declarative contract matrix against the shops listing API
//! - Validates the shape and content of the returned shop records
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Storefront E2E Runner (Rust)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── cases() -> [SuiteCase]   (api / ui / performance)    │
//! │    ├── run_api_case   ── SessionPool ── ContractMatrix      │
//! │    │                              └──── ShopListing checks  │
//! │    └── run_browser_case ── BrowserLauncher (one per case)   │
//! │                              └── ProductPage                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  wait                                                       │
//! │    poll_until(config, probe) -> WaitOutcome                 │
//! │      Idle -> Polling -> { Satisfied, TimedOut }             │
//! │    wait_for_change(baseline)   element_visible(locator)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod contract;
pub mod error;
pub mod locator;
pub mod product_page;
pub mod runner;
pub mod shops;
pub mod wait;
pub mod webdriver;

pub use config::HarnessConfig;
pub use contract::{ContractCase, ContractMatrix};
pub use error::{E2eError, E2eResult};
pub use runner::TestRunner;
pub use wait::{WaitConfig, WaitOutcome};
