//! Ledger options.

use serde::{Deserialize, Serialize};

use crate::LoadError;

/// Options stored in the `options` section of a ledger file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Title for the ledger.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Currency reports are converted into.
    pub base_currency: String,

    /// Number of days averages are scaled to.
    pub average_days: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

impl Options {
    /// Create new options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            title: None,
            base_currency: "USD".to_string(),
            average_days: 30,
        }
    }

    /// Set an option by name.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), LoadError> {
        match key {
            "title" => self.title = Some(value.to_string()),
            "base_currency" => {
                check_currency(value)?;
                self.base_currency = value.to_string();
            }
            "average_days" => {
                self.average_days = value
                    .parse()
                    .ok()
                    .filter(|days| *days > 0)
                    .ok_or_else(|| invalid(key, value, "expected a positive number of days"))?;
            }
            _ => return Err(invalid(key, value, "unknown option")),
        }
        Ok(())
    }

    /// Check every option value.
    pub fn validate(&self) -> Result<(), LoadError> {
        check_currency(&self.base_currency)?;
        if self.average_days == 0 {
            return Err(invalid(
                "average_days",
                "0",
                "expected a positive number of days",
            ));
        }
        Ok(())
    }
}

/// A currency code is three upper-case ASCII letters.
fn check_currency(value: &str) -> Result<(), LoadError> {
    if value.len() == 3 && value.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(invalid(
            "base_currency",
            value,
            "expected a three-letter upper-case currency code",
        ))
    }
}

fn invalid(option: &str, value: &str, reason: &str) -> LoadError {
    LoadError::InvalidOption {
        option: option.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
