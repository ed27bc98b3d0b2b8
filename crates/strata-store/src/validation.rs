//! Argument checks shared by backends and middleware.
//!
//! A value passed to [`Store::set`](crate::Store::set) is a byte slice and so
//! can never be absent; the only argument that needs a runtime check is the
//! key.

use crate::error::{StoreError, StoreResult};

/// Validate a key, returning `Ok(())` if it is usable.
///
/// # Examples
///
/// ```
/// use strata_store::validate_key;
///
/// assert!(validate_key("user:42").is_ok());
/// assert!(validate_key("").is_err());
/// ```
pub fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::EmptyKey);
    }
    Ok(())
}
