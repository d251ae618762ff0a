//! Storefront E2E runner entry point
//!
//! Run with: cargo run --package storefront-e2e -- --tag api

use std::path::PathBuf;
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use storefront_e2e::runner::TestSuiteResult;
use storefront_e2e::webdriver::BrowserKind;
use storefront_e2e::{ContractMatrix, HarnessConfig, TestRunner};

#[derive(Parser, Debug)]
#[command(name = "storefront-e2e")]
#[command(about = "Browser and API contract checks for the storefront")]
struct Args {
    /// YAML config file; flags below override its values
    #[arg(short, long, env = "STOREFRONT_CONFIG")]
    config: Option<PathBuf>,

    /// Storefront base URL
    #[arg(long, env = "STOREFRONT_BASE_URL")]
    base_url: Option<String>,

    /// WebDriver endpoint (chromedriver / geckodriver)
    #[arg(long, env = "STOREFRONT_WEBDRIVER_URL")]
    webdriver_url: Option<String>,

    /// Browser to use (chrome, firefox)
    #[arg(long, env = "STOREFRONT_BROWSER")]
    browser: Option<BrowserKind>,

    /// Run the browser headless
    #[arg(long)]
    headless: bool,

    /// Bearer token for the authenticated API session
    #[arg(long, env = "STOREFRONT_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Run only cases with this tag (api, ui, performance)
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only a specific case by name
    #[arg(short, long)]
    name: Option<String>,

    /// Directory of extra YAML contract tables
    #[arg(long)]
    cases_dir: Option<PathBuf>,

    /// Output directory for results
    #[arg(short, long, default_value = "test-results")]
    output: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with_target(false)
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(async_main(args)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

fn load_config(args: &Args) -> anyhow::Result<HarnessConfig> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => HarnessConfig::default(),
    };

    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(url) = &args.webdriver_url {
        config.browser.webdriver_url = url.clone();
    }
    if let Some(browser) = args.browser {
        config.browser.browser = browser;
    }
    if args.headless {
        config.browser.headless = true;
    }
    if let Some(token) = &args.api_token {
        config.api.token = Some(token.clone());
    }

    config.validate()?;
    Ok(config)
}

async fn async_main(args: Args) -> anyhow::Result<bool> {
    let config = load_config(&args)?;

    let extra_cases = match &args.cases_dir {
        Some(dir) => ContractMatrix::load_all(dir)
            .with_context(|| format!("loading contract tables from {}", dir.display()))?,
        None => ContractMatrix::default(),
    };

    let mut runner = TestRunner::new(config)
        .with_extra_cases(extra_cases)
        .with_output_dir(&args.output);

    let results = if let Some(name) = &args.name {
        let result = runner.run_test(name).await?;
        TestSuiteResult {
            started_at: chrono::Utc::now(),
            total: 1,
            passed: if result.success { 1 } else { 0 },
            failed: if result.success { 0 } else { 1 },
            skipped: 0,
            duration_ms: result.duration_ms,
            results: vec![result],
        }
    } else if let Some(tag) = &args.tag {
        runner.run_tagged(tag).await?
    } else {
        runner.run_all().await?
    };

    runner.write_results(&results)?;

    Ok(results.failed == 0)
}
