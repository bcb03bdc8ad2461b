//! Query Input Validation
//!
//! Checks run on caller input before anything is sent to the backend.

use crate::error::BridgeError;

/// Longest accepted query, in characters after trimming
pub const MAX_QUERY_CHARS: usize = 10_000;

/// Validates query text submitted by the caller
#[derive(Clone, Debug)]
pub struct QueryValidator {
    max_chars: usize,
}

impl Default for QueryValidator {
    fn default() -> Self {
        Self::new(MAX_QUERY_CHARS)
    }
}

impl QueryValidator {
    /// Create a validator with a custom length limit
    #[must_use]
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Validate a query and return the trimmed text to submit
    ///
    /// # Errors
    ///
    /// `InvalidQuery` if the trimmed query is empty, longer than the limit,
    /// or contains control characters other than newline, tab and carriage
    /// return.
    pub fn validate(&self, raw: &str) -> Result<String, BridgeError> {
        let query = raw.trim();

        if query.is_empty() {
            return Err(BridgeError::InvalidQuery("Query is empty".to_string()));
        }

        let chars = query.chars().count();
        if chars > self.max_chars {
            return Err(BridgeError::InvalidQuery(format!(
                "Query too long: {chars} characters (max: {})",
                self.max_chars
            )));
        }

        // Stricter than the length rule alone: control characters would end
        // up inside the backend prompt and in rendered output unescaped
        if query
            .chars()
            .any(|c| c.is_control() && c != '\n' && c != '\t' && c != '\r')
        {
            return Err(BridgeError::InvalidQuery(
                "Query contains invalid control characters".to_string(),
            ));
        }

        Ok(query.to_string())
    }
}
