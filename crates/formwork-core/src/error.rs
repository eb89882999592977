//! Error taxonomy
//!
//! Validator-reported errors are data (arbitrary `serde_json::Value`s held
//! in form state), never `Err`. This module only covers programming errors:
//! addressing a field that has no current registration indicates a mismatch
//! between the caller and the registry and is fatal to the call.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormError {
	#[error("field {name} is not registered")]
	UnknownField { name: String },
}

pub type FormResult<T> = Result<T, FormError>;
