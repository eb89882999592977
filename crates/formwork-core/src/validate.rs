//! Validation results and validator function types
//!
//! A validator may produce its verdict immediately or asynchronously; both
//! flow through the same [`Validation`] type so downstream merge logic
//! never inspects runtime types. Error values are arbitrary
//! `serde_json::Value`s — anything falsy (null, `false`, `0`, `""`) means
//! "no error" and is normalized away at the engine boundary.

use crate::form::Form;
use futures::future::BoxFuture;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// The result of running one validator.
pub enum Validation {
	/// The verdict is already known.
	Immediate(Value),
	/// The verdict is still being computed.
	Deferred(BoxFuture<'static, Value>),
}

impl Validation {
	/// An immediate "no error" verdict.
	///
	/// # Examples
	///
	/// ```
	/// use formwork_core::Validation;
	///
	/// assert!(!Validation::ok().is_deferred());
	/// ```
	pub fn ok() -> Self {
		Validation::Immediate(Value::Null)
	}

	/// An immediate verdict carrying an error value. Falsy values are
	/// equivalent to [`Validation::ok`].
	///
	/// # Examples
	///
	/// ```
	/// use formwork_core::Validation;
	///
	/// let verdict = Validation::error("required");
	/// assert!(!verdict.is_deferred());
	/// ```
	pub fn error(error: impl Into<Value>) -> Self {
		Validation::Immediate(error.into())
	}

	/// A verdict that resolves asynchronously.
	pub fn deferred<F>(future: F) -> Self
	where
		F: Future<Output = Value> + Send + 'static,
	{
		Validation::Deferred(Box::pin(future))
	}

	pub fn is_deferred(&self) -> bool {
		matches!(self, Validation::Deferred(_))
	}
}

/// A caller-supplied validator.
///
/// Field-level validators receive the field's current value; the form-level
/// validator receives the full values tree and reports a tree of errors.
/// Both also receive the [`Form`] handle for programmatic access.
pub type Validator = Arc<dyn Fn(&Value, &Form) -> Validation + Send + Sync>;

/// Wraps a closure into a [`Validator`].
pub fn validator<F>(validate: F) -> Validator
where
	F: Fn(&Value, &Form) -> Validation + Send + Sync + 'static,
{
	Arc::new(validate)
}

/// The external submit handler, invoked with the current values tree and
/// the form handle once validation has passed. An `Err` propagates out of
/// `submit_form` after state cleanup.
pub type SubmitHandler = Arc<dyn Fn(Value, Form) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Wraps a closure into a [`SubmitHandler`].
pub fn submit_handler<F>(handler: F) -> SubmitHandler
where
	F: Fn(Value, Form) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync + 'static,
{
	Arc::new(handler)
}

/// Falsy error values never count as errors.
pub(crate) fn normalize(error: Value) -> Option<Value> {
	if formwork_paths::is_truthy(&error) {
		Some(error)
	} else {
		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn falsy_errors_normalize_to_none() {
		assert_eq!(normalize(json!(null)), None);
		assert_eq!(normalize(json!("")), None);
		assert_eq!(normalize(json!(0)), None);
		assert_eq!(normalize(json!(false)), None);
		assert_eq!(normalize(json!("bad")), Some(json!("bad")));
		assert_eq!(normalize(json!({"a": "bad"})), Some(json!({"a": "bad"})));
	}
}
