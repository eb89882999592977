//! Form configuration
//!
//! Policy flags live in [`FormOptions`] (plain data, serde-capable); the
//! validator and submit handler are function objects attached through the
//! builder methods on [`FormConfig`].

use crate::form::Form;
use crate::validate::{SubmitHandler, Validation, Validator};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Behavioral flags resolved by field controllers and the form controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormOptions {
	/// Validate every field as it mounts (also makes fields start touched).
	pub validate_on_mount: bool,
	/// Validate on value changes.
	pub validate_on_change: bool,
	/// Validate when a field blurs.
	pub validate_on_blur: bool,
	pub touch_on_mount: bool,
	/// Mark a field touched on its first change.
	pub touch_on_change: bool,
	/// Mark a field touched when it blurs.
	pub touch_on_blur: bool,
	/// Form-wide default for dropping a field's registration when the
	/// field unmounts or changes name; overridable per field.
	pub should_unregister: bool,
}

impl Default for FormOptions {
	fn default() -> Self {
		Self {
			validate_on_mount: false,
			validate_on_change: true,
			validate_on_blur: true,
			touch_on_mount: false,
			touch_on_change: true,
			touch_on_blur: true,
			should_unregister: true,
		}
	}
}

impl FormOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_validate_on_mount(mut self, flag: bool) -> Self {
		self.validate_on_mount = flag;
		self
	}

	pub fn with_validate_on_change(mut self, flag: bool) -> Self {
		self.validate_on_change = flag;
		self
	}

	pub fn with_validate_on_blur(mut self, flag: bool) -> Self {
		self.validate_on_blur = flag;
		self
	}

	pub fn with_touch_on_change(mut self, flag: bool) -> Self {
		self.touch_on_change = flag;
		self
	}

	pub fn with_touch_on_blur(mut self, flag: bool) -> Self {
		self.touch_on_blur = flag;
		self
	}

	pub fn with_should_unregister(mut self, flag: bool) -> Self {
		self.should_unregister = flag;
		self
	}
}

/// Everything a [`Form`](crate::form::Form) is constructed with.
///
/// # Examples
///
/// ```
/// use formwork_core::{FormConfig, Validation};
/// use serde_json::json;
///
/// let config = FormConfig::new()
///     .with_initial_values(json!({"user": {"name": "django"}}))
///     .with_validate(|values, _form| {
///         if formwork_paths::get(values, "user.name").is_some() {
///             Validation::ok()
///         } else {
///             Validation::error(json!({"user": {"name": "required"}}))
///         }
///     });
/// assert!(config.validate.is_some());
/// ```
#[derive(Clone)]
pub struct FormConfig {
	pub options: FormOptions,
	/// Tree consulted for a field's initial value when the field itself
	/// does not supply one.
	pub initial_values: Value,
	/// Form-level validator, run against the full values tree.
	pub validate: Option<Validator>,
	/// Submit handler invoked once validation passes.
	pub on_submit: Option<SubmitHandler>,
}

impl Default for FormConfig {
	fn default() -> Self {
		Self {
			options: FormOptions::default(),
			initial_values: Value::Object(Map::new()),
			validate: None,
			on_submit: None,
		}
	}
}

impl FormConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_options(mut self, options: FormOptions) -> Self {
		self.options = options;
		self
	}

	pub fn with_initial_values(mut self, initial_values: Value) -> Self {
		self.initial_values = initial_values;
		self
	}

	pub fn with_validate<F>(mut self, validate: F) -> Self
	where
		F: Fn(&Value, &Form) -> Validation + Send + Sync + 'static,
	{
		self.validate = Some(Arc::new(validate));
		self
	}

	pub fn with_submit<F>(mut self, on_submit: F) -> Self
	where
		F: Fn(Value, Form) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync + 'static,
	{
		self.on_submit = Some(Arc::new(on_submit));
		self
	}
}

impl fmt::Debug for FormConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FormConfig")
			.field("options", &self.options)
			.field("initial_values", &self.initial_values)
			.field("validate", &self.validate.is_some())
			.field("on_submit", &self.on_submit.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_match_documented_policy() {
		let options = FormOptions::default();
		assert!(!options.validate_on_mount);
		assert!(options.validate_on_change);
		assert!(options.validate_on_blur);
		assert!(!options.touch_on_mount);
		assert!(options.touch_on_change);
		assert!(options.touch_on_blur);
		assert!(options.should_unregister);
	}

	#[test]
	fn options_round_trip_through_serde() {
		let options = FormOptions::new()
			.with_validate_on_mount(true)
			.with_touch_on_change(false);
		let encoded = serde_json::to_string(&options).unwrap();
		let decoded: FormOptions = serde_json::from_str(&encoded).unwrap();
		assert_eq!(options, decoded);
	}
}
