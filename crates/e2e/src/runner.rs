//! Test runner that orchestrates the API contract checks and browser scenarios

use std::path::PathBuf;
use std::time::Instant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::api::{ApiConfig, SessionPool};
use crate::config::HarnessConfig;
use crate::contract::{self, ContractCase, ContractMatrix};
use crate::error::{E2eError, E2eResult};
use crate::product_page::ProductPage;
use crate::webdriver::{BrowserDriver, BrowserLauncher, WebDriverLauncher};

pub const TAG_API: &str = "api";
pub const TAG_UI: &str = "ui";
pub const TAG_PERFORMANCE: &str = "performance";

/// Result of running a single case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub tags: Vec<String>,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Result of running a set of cases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    pub fn result(&self, name: &str) -> Option<&TestResult> {
        self.results.iter().find(|r| r.name == name)
    }
}

/// What a case checks
#[derive(Debug, Clone)]
pub enum CaseKind {
    /// One row of a contract matrix
    Contract(ContractCase),
    ShopsDataStructure,
    CoordinatesValidity,
    WorkTimeFormat,
    ShopPresence(String),
    ResponseTime,
    CartCounter,
    AddToCartNotification,
}

/// A named, tagged case in the catalogue
#[derive(Debug, Clone)]
pub struct SuiteCase {
    pub name: String,
    pub tags: Vec<&'static str>,
    pub kind: CaseKind,
}

impl SuiteCase {
    fn new(name: impl Into<String>, tags: &[&'static str], kind: CaseKind) -> Self {
        Self {
            name: name.into(),
            tags: tags.to_vec(),
            kind,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| *t == tag)
    }

    fn needs_browser(&self) -> bool {
        matches!(self.kind, CaseKind::CartCounter | CaseKind::AddToCartNotification)
    }
}

/// Main E2E test runner
pub struct TestRunner {
    config: HarnessConfig,

    /// Starts a fresh browser for every UI case
    launcher: Box<dyn BrowserLauncher>,

    /// Additional contract rows loaded from YAML
    extra_cases: ContractMatrix,

    /// Shared authenticated session, built on first use
    sessions: Option<SessionPool>,

    /// Output directory for results
    output_dir: PathBuf,
}

impl TestRunner {
    /// Create a runner that drives a real browser through WebDriver
    pub fn new(config: HarnessConfig) -> Self {
        let launcher = WebDriverLauncher::new(config.browser.clone());
        Self::with_launcher(config, Box::new(launcher))
    }

    pub fn with_launcher(config: HarnessConfig, launcher: Box<dyn BrowserLauncher>) -> Self {
        Self {
            config,
            launcher,
            extra_cases: ContractMatrix::default(),
            sessions: None,
            output_dir: PathBuf::from("test-results"),
        }
    }

    pub fn with_extra_cases(mut self, cases: ContractMatrix) -> Self {
        self.extra_cases = cases;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Every case this runner knows about, in execution order
    pub fn cases(&self) -> Vec<SuiteCase> {
        let api: &ApiConfig = &self.config.api;
        let mut cases = Vec::new();

        for case in ContractMatrix::status_codes(&api.shops_path).cases {
            cases.push(SuiteCase::new(format!("status::{}", case.id), &[TAG_API], CaseKind::Contract(case)));
        }
        for case in ContractMatrix::malformed_inputs(&api.shops_path).cases {
            cases.push(SuiteCase::new(format!("malformed::{}", case.id), &[TAG_API], CaseKind::Contract(case)));
        }
        for case in &self.extra_cases.cases {
            cases.push(SuiteCase::new(
                format!("contract::{}", case.id),
                &[TAG_API],
                CaseKind::Contract(case.clone()),
            ));
        }

        cases.push(SuiteCase::new("shops_data_structure", &[TAG_API], CaseKind::ShopsDataStructure));
        cases.push(SuiteCase::new("coordinates_validity", &[TAG_API], CaseKind::CoordinatesValidity));
        cases.push(SuiteCase::new("work_time_format", &[TAG_API], CaseKind::WorkTimeFormat));
        for name in &api.expected_shops {
            cases.push(SuiteCase::new(
                format!("shop_presence::{}", name),
                &[TAG_API],
                CaseKind::ShopPresence(name.clone()),
            ));
        }
        cases.push(SuiteCase::new(
            "response_time",
            &[TAG_API, TAG_PERFORMANCE],
            CaseKind::ResponseTime,
        ));

        cases.push(SuiteCase::new("cart_counter", &[TAG_UI], CaseKind::CartCounter));
        cases.push(SuiteCase::new(
            "add_to_cart_notification",
            &[TAG_UI],
            CaseKind::AddToCartNotification,
        ));

        cases
    }

    /// Run the whole catalogue
    pub async fn run_all(&mut self) -> E2eResult<TestSuiteResult> {
        let cases = self.cases();
        self.run_cases(&cases).await
    }

    /// Run cases carrying a tag
    pub async fn run_tagged(&mut self, tag: &str) -> E2eResult<TestSuiteResult> {
        let cases: Vec<SuiteCase> = self.cases().into_iter().filter(|c| c.has_tag(tag)).collect();
        if cases.is_empty() {
            warn!("No cases tagged '{}'", tag);
        }
        self.run_cases(&cases).await
    }

    /// Run a specific case by name
    pub async fn run_test(&mut self, name: &str) -> E2eResult<TestResult> {
        let case = self
            .cases()
            .into_iter()
            .find(|c| c.name == name)
            .ok_or_else(|| E2eError::Config(format!("Test not found: {}", name)))?;
        Ok(self.run_case(&case).await)
    }

    /// Run a list of cases; one failing case never stops the rest
    pub async fn run_cases(&mut self, cases: &[SuiteCase]) -> E2eResult<TestSuiteResult> {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut results = Vec::with_capacity(cases.len());

        info!("Running {} test(s)...", cases.len());

        for case in cases {
            let result = self.run_case(case).await;
            if result.success {
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                error!("✗ {} - {}", result.name, result.error.as_deref().unwrap_or("unknown error"));
            }
            results.push(result);
        }

        let passed = results.iter().filter(|r| r.success).count();
        let failed = results.len() - passed;
        let skipped = 0;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!("Test Results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms);

        Ok(TestSuiteResult {
            started_at,
            total: cases.len(),
            passed,
            failed,
            skipped,
            duration_ms,
            results,
        })
    }

    /// Run one case and fold any error into its result
    pub async fn run_case(&mut self, case: &SuiteCase) -> TestResult {
        let start = Instant::now();
        debug!("Running test: {}", case.name);

        let outcome = if case.needs_browser() {
            self.run_browser_case(&case.kind).await
        } else {
            self.run_api_case(&case.kind).await
        };

        TestResult {
            name: case.name.clone(),
            tags: case.tags.iter().map(|t| t.to_string()).collect(),
            success: outcome.is_ok(),
            duration_ms: start.elapsed().as_millis() as u64,
            error: outcome.err().map(|e| e.to_string()),
        }
    }

    fn sessions(&mut self) -> E2eResult<&SessionPool> {
        if self.sessions.is_none() {
            self.sessions = Some(SessionPool::new(self.config.origin(), &self.config.api)?);
        }
        self.sessions
            .as_ref()
            .ok_or_else(|| E2eError::Config("HTTP session unavailable".to_string()))
    }

    async fn run_api_case(&mut self, kind: &CaseKind) -> E2eResult<()> {
        let api = self.config.api.clone();
        let pool = self.sessions()?;
        let session = pool.authenticated();

        match kind {
            CaseKind::Contract(case) => contract::verify_case(pool, case).await,
            CaseKind::ShopsDataStructure => {
                let listing = session.list_shops().await?;
                listing.verify_not_empty()?;
                listing.verify_required_fields(api.structure_sample)
            }
            CaseKind::CoordinatesValidity => {
                let listing = session.list_shops().await?;
                listing.verify_coordinates(api.validation_sample)
            }
            CaseKind::WorkTimeFormat => {
                let listing = session.list_shops().await?;
                listing.verify_work_times(api.validation_sample)
            }
            CaseKind::ShopPresence(name) => {
                let listing = session.list_shops().await?;
                listing.verify_contains_name(name)
            }
            CaseKind::ResponseTime => {
                let (status, elapsed) = session.time_listing_request().await?;
                let limit = api.max_response_time();
                debug!("Listing answered {} in {} ms", status, elapsed.as_millis());
                if elapsed >= limit {
                    return Err(E2eError::AssertionFailed(format!(
                        "Response time {} ms exceeds {} ms",
                        elapsed.as_millis(),
                        limit.as_millis()
                    )));
                }
                Ok(())
            }
            CaseKind::CartCounter | CaseKind::AddToCartNotification => Err(E2eError::Config(
                "browser case routed to the API runner".to_string(),
            )),
        }
    }

    /// Launch a browser for this case only and always quit it afterwards
    async fn run_browser_case(&self, kind: &CaseKind) -> E2eResult<()> {
        let driver = self.launcher.launch().await?;
        let outcome = self.browser_scenario(driver.as_ref(), kind).await;

        if let Err(e) = driver.quit().await {
            warn!("Failed to close browser: {}", e);
        }
        outcome
    }

    async fn browser_scenario(&self, driver: &dyn BrowserDriver, kind: &CaseKind) -> E2eResult<()> {
        let page = ProductPage::new(
            driver,
            self.config.product_url(),
            &self.config.page.locators,
            self.config.wait_config(),
        );
        page.open().await?;
        page.dismiss_cookie_banner().await?;

        match kind {
            CaseKind::CartCounter => {
                page.add_to_cart().await?;
                let counter = page.cart_counter().await?;
                if counter != 1 {
                    return Err(E2eError::AssertionFailed(format!(
                        "Unexpected cart counter value: expected 1, got {}",
                        counter
                    )));
                }
                Ok(())
            }
            CaseKind::AddToCartNotification => {
                page.add_to_cart().await?;
                page.wait_for_add_to_cart_notification().await
            }
            _ => Err(E2eError::Config("API case routed to the browser runner".to_string())),
        }
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}
