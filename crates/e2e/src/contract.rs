//! Declarative contract matrix for the shops API
//!
//! Each [`ContractCase`] is one row: a request shape and the status code the
//! API must answer with. Rows are plain data, so the built-in tables and any
//! YAML tables go through the same [`verify_case`] function.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::api::SessionPool;
use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }

    /// Write-type methods carry a request body
    pub fn sends_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_reqwest().as_str())
    }
}

/// Request payload for a case
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RequestBody {
    #[default]
    None,

    /// Serialized as JSON
    Json(Value),

    /// Sent verbatim, for content-type and parse failures
    Raw(String),
}

/// Which HTTP session a case runs on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionVariant {
    /// The shared session with the standard headers
    #[default]
    Authenticated,

    /// A fresh session with no headers or credentials
    Anonymous,
}

/// One row of the contract matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractCase {
    /// Identifier used in failure messages
    pub id: String,

    pub method: HttpMethod,

    pub path: String,

    #[serde(default)]
    pub body: RequestBody,

    pub expected_status: u16,

    /// Per-request header overrides
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub session: SessionVariant,
}

impl ContractCase {
    pub fn new(id: &str, method: HttpMethod, path: &str, expected_status: u16) -> Self {
        Self {
            id: id.to_string(),
            method,
            path: path.to_string(),
            body: RequestBody::None,
            expected_status,
            headers: BTreeMap::new(),
            session: SessionVariant::Authenticated,
        }
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn raw(mut self, body: &str) -> Self {
        self.body = RequestBody::Raw(body.to_string());
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.session = SessionVariant::Anonymous;
        self
    }
}

/// Send the case's request and return the status code
pub async fn execute_case(pool: &SessionPool, case: &ContractCase) -> E2eResult<u16> {
    let session = pool.session(case.session)?;
    let response = session.send(case.method, &case.path, &case.body, &case.headers).await?;
    Ok(response.status().as_u16())
}

/// Execute the case and require the exact expected status
pub async fn verify_case(pool: &SessionPool, case: &ContractCase) -> E2eResult<()> {
    let actual = execute_case(pool, case).await?;
    check_status(case, actual)
}

/// A row passes only on the exact expected status
fn check_status(case: &ContractCase, actual: u16) -> E2eResult<()> {
    debug!("Case '{}': expected {}, got {}", case.id, case.expected_status, actual);
    if actual != case.expected_status {
        return Err(E2eError::ContractMismatch {
            case: case.id.clone(),
            expected: case.expected_status,
            actual,
        });
    }
    Ok(())
}

/// Result of one executed row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub id: String,
    pub expected: u16,
    pub actual: Option<u16>,
    pub passed: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatrixReport {
    pub outcomes: Vec<CaseOutcome>,
}

impl MatrixReport {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    pub fn outcome(&self, id: &str) -> Option<&CaseOutcome> {
        self.outcomes.iter().find(|o| o.id == id)
    }
}

/// An ordered table of contract cases
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractMatrix {
    pub cases: Vec<ContractCase>,
}

impl ContractMatrix {
    pub fn new(cases: Vec<ContractCase>) -> Self {
        Self { cases }
    }

    /// Status code contract of the listing endpoint
    pub fn status_codes(shops_path: &str) -> Self {
        Self::new(vec![
            ContractCase::new("success", HttpMethod::Post, shops_path, 200).json(json!({})),
            ContractCase::new("invalid_method", HttpMethod::Get, shops_path, 405),
            ContractCase::new("invalid_content_type", HttpMethod::Post, shops_path, 415)
                .raw("not json")
                .header("Content-Type", "text/plain"),
            ContractCase::new("unauthorized", HttpMethod::Post, shops_path, 401)
                .json(json!({}))
                .anonymous(),
            ContractCase::new("not_found", HttpMethod::Post, "/api/non_existent_endpoint", 404).json(json!({})),
        ])
    }

    /// Structurally invalid bodies the listing endpoint must reject
    pub fn malformed_inputs(shops_path: &str) -> Self {
        Self::new(vec![
            ContractCase::new("unexpected_key", HttpMethod::Post, shops_path, 400)
                .json(json!({ "invalid_key": "value" })),
            ContractCase::new("non_numeric_page_size", HttpMethod::Post, shops_path, 400)
                .json(json!({ "pageSize": "not_a_number" })),
            ContractCase::new("negative_page_size", HttpMethod::Post, shops_path, 400)
                .json(json!({ "pageSize": -1 })),
        ])
    }

    /// Parse a table from YAML: either `cases: [...]` or a bare list
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Table {
            Wrapped(ContractMatrix),
            Bare(Vec<ContractCase>),
        }

        let matrix = match serde_yaml::from_str::<Table>(yaml)? {
            Table::Wrapped(matrix) => matrix,
            Table::Bare(cases) => Self::new(cases),
        };
        matrix.validate()?;
        Ok(matrix)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::CaseTable(format!("{}: {}", path.display(), e)))
    }

    /// Load and concatenate every YAML table under `dir`, in path order
    pub fn load_all(dir: &Path) -> E2eResult<Self> {
        let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        let mut cases = Vec::new();
        for path in paths {
            cases.extend(Self::from_file(&path)?.cases);
        }
        let matrix = Self::new(cases);
        matrix.validate()?;
        Ok(matrix)
    }

    /// Ids must be non-empty and unique so failures stay attributable
    pub fn validate(&self) -> E2eResult<()> {
        let mut seen = std::collections::HashSet::new();
        for case in &self.cases {
            if case.id.trim().is_empty() {
                return Err(E2eError::CaseTable("Case with empty id".to_string()));
            }
            if !seen.insert(case.id.as_str()) {
                return Err(E2eError::CaseTable(format!("Duplicate case id: {}", case.id)));
            }
            if !case.path.starts_with('/') {
                return Err(E2eError::CaseTable(format!(
                    "Case '{}': path must start with '/', got '{}'",
                    case.id, case.path
                )));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Run every row. A failing row is recorded and the next one still runs.
    pub async fn execute(&self, pool: &SessionPool) -> MatrixReport {
        let mut outcomes = Vec::with_capacity(self.cases.len());

        for case in &self.cases {
            let (actual, verdict) = match execute_case(pool, case).await {
                Ok(actual) => (Some(actual), check_status(case, actual)),
                Err(e) => (None, Err(e)),
            };
            match &verdict {
                Ok(()) => info!("✓ {} ({} {} -> {})", case.id, case.method, case.path, actual.unwrap_or_default()),
                Err(e) => error!("✗ {} - {}", case.id, e),
            }
            let outcome = CaseOutcome {
                id: case.id.clone(),
                expected: case.expected_status,
                actual,
                passed: verdict.is_ok(),
                error: verdict.err().map(|e| e.to_string()),
            };
            outcomes.push(outcome);
        }

        MatrixReport { outcomes }
    }
}
