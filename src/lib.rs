//! # Formwork
//!
//! A reactive form-state engine for Rust: a field registry with dot-path
//! names, field- and form-level validation (sync or async) merged under a
//! defined precedence, batched atomic state transitions, and a submission
//! state machine with guaranteed cleanup.
//!
//! Formwork has no opinion on rendering. A UI-binding layer constructs a
//! [`Form`], mounts [`Field`] controllers against it, forwards user
//! interaction to the field handlers and renders from the aggregate read
//! APIs.
//!
//! ## Quick example
//!
//! ```rust,ignore
//! use formwork::prelude::*;
//! use serde_json::json;
//!
//! let form = Form::new(
//!     FormConfig::new()
//!         .with_initial_values(json!({"user": {"name": ""}}))
//!         .with_validate(|values, _form| {
//!             match formwork::paths::get(values, "user.name") {
//!                 Some(name) if name != "" => Validation::ok(),
//!                 _ => Validation::error(json!({"user": {"name": "required"}})),
//!             }
//!         }),
//! );
//!
//! let name = Field::mount(&form, FieldOptions::new("user.name")).await;
//! name.on_change(json!("django")).await;
//! assert_eq!(form.submit_form().await?, SubmitOutcome::Submitted(serde_json::Value::Null));
//! ```

pub use formwork_core::*;

/// Dot-path access over `serde_json::Value` trees.
pub use formwork_paths as paths;

/// Commonly used types in one import.
pub mod prelude {
	pub use formwork_core::{
		Field, FieldArray, FieldOptions, FieldProps, Form, FormConfig, FormOptions, FormSnapshot,
		SlotSeed, SubmitOutcome, Validation,
	};
}
