//! Search input validation.

use crate::error::QueryError;

/// Normalize a raw search term before it reaches the engine.
///
/// Trims surrounding whitespace and lower-cases the term. Empty and
/// whitespace-only input is rejected.
pub fn validate_query(raw: &str) -> Result<String, QueryError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(QueryError::Empty);
    }
    Ok(trimmed.to_lowercase())
}
