//! Shop records returned by the listing endpoint and their validators

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{E2eError, E2eResult};

/// Fields every shop record must carry
pub const REQUIRED_FIELDS: [&str; 10] = [
    "id",
    "partnerId",
    "name",
    "longitude",
    "latitude",
    "address",
    "workTime",
    "quantity",
    "existThing",
    "needPromocode",
];

static CLOCK_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{1,2})$").expect("valid clock regex"));

/// One shop as returned by the API
///
/// Kept as the raw JSON object: the checks here are about which fields the
/// backend sends and what they contain, so nothing is dropped or defaulted
/// while decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShopRecord(Map<String, Value>);

impl ShopRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Required fields this record lacks
    pub fn missing_fields(&self) -> Vec<&'static str> {
        REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| !self.0.contains_key(*field))
            .collect()
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn longitude(&self) -> E2eResult<f64> {
        self.number("longitude")
    }

    pub fn latitude(&self) -> E2eResult<f64> {
        self.number("latitude")
    }

    pub fn work_time(&self) -> E2eResult<&str> {
        self.0
            .get("workTime")
            .and_then(Value::as_str)
            .ok_or_else(|| self.malformed("workTime", "expected a string"))
    }

    /// A numeric field that may be sent as a number or a numeric string
    fn number(&self, field: &str) -> E2eResult<f64> {
        match self.0.get(field) {
            Some(Value::Number(n)) => n.as_f64().ok_or_else(|| self.malformed(field, "not representable as f64")),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| self.malformed(field, &format!("'{}' is not a number", s))),
            Some(other) => Err(self.malformed(field, &format!("unexpected value {}", other))),
            None => Err(self.malformed(field, "missing")),
        }
    }

    fn malformed(&self, field: &str, detail: &str) -> E2eError {
        E2eError::MalformedData(format!(
            "shop {} field '{}': {}",
            self.0.get("id").map(Value::to_string).unwrap_or_else(|| "?".to_string()),
            field,
            detail
        ))
    }
}

/// Decoded listing response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopListing {
    pub shops: Vec<ShopRecord>,
}

impl ShopListing {
    /// The body must be a JSON array of objects
    pub fn from_response(payload: Value) -> E2eResult<Self> {
        let Value::Array(items) = payload else {
            return Err(E2eError::AssertionFailed(format!(
                "Response must be a list, got {}",
                json_kind(&payload)
            )));
        };

        let shops = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(fields) => Ok(ShopRecord(fields)),
                other => Err(E2eError::AssertionFailed(format!(
                    "Shop #{} must be an object, got {}",
                    index,
                    json_kind(&other)
                ))),
            })
            .collect::<E2eResult<Vec<_>>>()?;

        Ok(Self { shops })
    }

    pub fn len(&self) -> usize {
        self.shops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shops.is_empty()
    }

    /// The first `n` records
    pub fn sample(&self, n: usize) -> &[ShopRecord] {
        &self.shops[..n.min(self.shops.len())]
    }

    pub fn verify_not_empty(&self) -> E2eResult<()> {
        if self.is_empty() {
            return Err(E2eError::AssertionFailed("Shop list must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn verify_required_fields(&self, sample: usize) -> E2eResult<()> {
        for (index, shop) in self.sample(sample).iter().enumerate() {
            let missing = shop.missing_fields();
            if !missing.is_empty() {
                return Err(E2eError::AssertionFailed(format!(
                    "Shop #{} is missing field(s): {}",
                    index,
                    missing.join(", ")
                )));
            }
        }
        Ok(())
    }

    pub fn verify_coordinates(&self, sample: usize) -> E2eResult<()> {
        for shop in self.sample(sample) {
            let longitude = shop.longitude()?;
            let latitude = shop.latitude()?;
            if !is_valid_longitude(longitude) {
                return Err(E2eError::AssertionFailed(format!("Invalid longitude: {}", longitude)));
            }
            if !is_valid_latitude(latitude) {
                return Err(E2eError::AssertionFailed(format!("Invalid latitude: {}", latitude)));
            }
        }
        Ok(())
    }

    pub fn verify_work_times(&self, sample: usize) -> E2eResult<()> {
        for shop in self.sample(sample) {
            let work_time = shop.work_time()?;
            if !is_valid_work_time(work_time) {
                return Err(E2eError::AssertionFailed(format!("Invalid work time: {}", work_time)));
            }
        }
        Ok(())
    }

    /// Searches the whole listing, not only the sampled prefix
    pub fn contains_name(&self, name: &str) -> bool {
        self.shops.iter().any(|shop| shop.name() == Some(name))
    }

    pub fn verify_contains_name(&self, name: &str) -> E2eResult<()> {
        if !self.contains_name(name) {
            return Err(E2eError::AssertionFailed(format!("Shop '{}' not found", name)));
        }
        Ok(())
    }
}

pub fn is_valid_longitude(longitude: f64) -> bool {
    (-180.0..=180.0).contains(&longitude)
}

pub fn is_valid_latitude(latitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude)
}

/// `H[H]:M[M]` with hour in 0..24 and minute in 0..60
pub fn is_valid_time(time: &str) -> bool {
    let Some(caps) = CLOCK_TIME.captures(time) else {
        return false;
    };
    match (caps[1].parse::<u32>(), caps[2].parse::<u32>()) {
        (Ok(hours), Ok(minutes)) => hours < 24 && minutes < 60,
        _ => false,
    }
}

/// `<start> - <end>`, both valid clock times
pub fn is_valid_work_time(work_time: &str) -> bool {
    let mut parts = work_time.split(" - ");
    match (parts.next(), parts.next(), parts.next()) {
        (Some(start), Some(end), None) => is_valid_time(start) && is_valid_time(end),
        _ => false,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
