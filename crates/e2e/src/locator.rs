//! Element locators and their W3C WebDriver strategies

use serde::{Deserialize, Serialize};
use std::fmt;

/// How to find an element on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum Locator {
    /// Element `id` attribute
    Id(String),

    /// CSS selector
    Css(String),

    /// XPath expression
    #[serde(rename = "xpath")]
    XPath(String),

    /// Any element whose own text contains the given string
    Text(String),
}

impl Locator {
    pub fn id(value: impl Into<String>) -> Self {
        Locator::Id(value.into())
    }

    pub fn css(value: impl Into<String>) -> Self {
        Locator::Css(value.into())
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Locator::XPath(value.into())
    }

    pub fn text(value: impl Into<String>) -> Self {
        Locator::Text(value.into())
    }

    /// The `(using, value)` pair for a W3C find-element request
    pub fn strategy(&self) -> (&'static str, String) {
        match self {
            Locator::Id(id) => ("css selector", format!("#{}", css_escape(id))),
            Locator::Css(selector) => ("css selector", selector.clone()),
            Locator::XPath(expr) => ("xpath", expr.clone()),
            Locator::Text(text) => ("xpath", format!("//*[contains(text(), {})]", xpath_literal(text))),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(v) => write!(f, "id={}", v),
            Locator::Css(v) => write!(f, "css={}", v),
            Locator::XPath(v) => write!(f, "xpath={}", v),
            Locator::Text(v) => write!(f, "text={}", v),
        }
    }
}

/// Escape characters that would end an id selector early
fn css_escape(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for c in id.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

/// Quote a string for XPath 1.0, which has no escape sequences
fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{}'", text)
    } else if !text.contains('"') {
        format!("\"{}\"", text)
    } else {
        let parts: Vec<String> = text.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}
