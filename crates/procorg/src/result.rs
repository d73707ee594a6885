//! Result type alias for registry internals.
//!
//! ```rust
//! use procorg::Result;
//!
//! fn parse_grace(raw: &str) -> Result<u64> {
//!     raw.parse()
//!         .map_err(|e| procorg::RegistryError::config(format!("Invalid grace: {}", e)))
//! }
//! ```

/// Convenience alias for `std::result::Result<T, crate::RegistryError>`.
pub type Result<T, E = crate::RegistryError> = std::result::Result<T, E>;
