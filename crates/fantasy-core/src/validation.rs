// Field-level rule checks used by every entity validator.
//
// Validators collect every violation instead of stopping at the first one,
// so a single response can report all problems with a payload.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("email regex")
});

static HTTP_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("url regex"));

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("username regex"));

static SHORT_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]+$").expect("short code regex"));

/// A single field-level rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

/// Every rule violated by one candidate entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldViolation>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldViolation {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.0
    }

    /// Whether any violation carries exactly this message.
    pub fn has_message(&self, message: &str) -> bool {
        self.0.iter().any(|v| v.message == message)
    }

    /// Whether any violation concerns this field.
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|v| v.field == field)
    }

    /// Append another set of violations.
    pub fn merge(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    /// `Ok(())` when no rule was violated.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    // -- rule helpers -------------------------------------------------------

    pub fn require_non_empty(&mut self, field: &str, value: &str, message: &str) {
        if value.trim().is_empty() {
            self.push(field, message);
        }
    }

    pub fn require_max_len(&mut self, field: &str, value: &str, max: usize, message: &str) {
        if value.chars().count() > max {
            self.push(field, message);
        }
    }

    pub fn require_range<T: PartialOrd>(
        &mut self,
        field: &str,
        value: T,
        min: T,
        max: T,
        message: &str,
    ) {
        if value < min || value > max {
            self.push(field, message);
        }
    }

    /// Optional fields are only range-checked when present.
    pub fn require_range_opt<T: PartialOrd + Copy>(
        &mut self,
        field: &str,
        value: Option<T>,
        min: T,
        max: T,
        message: &str,
    ) {
        if let Some(v) = value {
            self.require_range(field, v, min, max, message);
        }
    }

    pub fn require_http_url(&mut self, field: &str, value: Option<&str>, message: &str) {
        if let Some(url) = value {
            if !is_http_url(url) {
                self.push(field, message);
            }
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|v| v.message.as_str()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

pub fn is_http_url(value: &str) -> bool {
    HTTP_URL_RE.is_match(value)
}

pub fn is_valid_username(value: &str) -> bool {
    USERNAME_RE.is_match(value)
}

pub fn is_upper_alphanumeric(value: &str) -> bool {
    SHORT_CODE_RE.is_match(value)
}
