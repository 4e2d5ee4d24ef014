//! Validated request parameters
//!
//! These check request-level shape only. Text values are kept verbatim:
//! quotes, semicolons and SQL keywords are legal content because the value
//! is always bound as a parameter downstream.

use super::ValidationError;

/// Maximum length for a transaction id
const MAX_TXN_ID_LEN: usize = 64;

/// Maximum length for a product search term
const MAX_SEARCH_LEN: usize = 256;

/// Integer record identifier (`id`, `userId`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(i64);

impl RecordId {
    /// Parse an identifier from raw request text.
    ///
    /// # Example
    /// ```
    /// use querygate_server::models::RecordId;
    ///
    /// assert_eq!(RecordId::parse("id", "42").unwrap().get(), 42);
    /// assert!(RecordId::parse("id", "1 OR 1=1").is_err());
    /// ```
    pub fn parse(field: &'static str, raw: &str) -> Result<Self, ValidationError> {
        if raw.is_empty() {
            return Err(ValidationError::Empty { field });
        }

        raw.parse::<i64>()
            .map(Self)
            .map_err(|_| ValidationError::InvalidFormat {
                field,
                reason: "must be an integer",
            })
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

/// Payment transaction id, an opaque non-empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxnId(String);

impl TxnId {
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        if raw.trim().is_empty() {
            return Err(ValidationError::Empty { field: "txnId" });
        }

        if raw.chars().count() > MAX_TXN_ID_LEN {
            return Err(ValidationError::TooLong {
                field: "txnId",
                max: MAX_TXN_ID_LEN,
            });
        }

        Ok(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Product name used for exact-match search.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchName(String);

impl SearchName {
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        if raw.is_empty() {
            return Err(ValidationError::Empty { field: "name" });
        }

        if raw.chars().count() > MAX_SEARCH_LEN {
            return Err(ValidationError::TooLong {
                field: "name",
                max: MAX_SEARCH_LEN,
            });
        }

        Ok(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}
