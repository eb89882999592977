//! Formwork core — a reactive form-state engine
//!
//! Tracks a dynamic set of named input fields with nested dot-path
//! identifiers, orchestrates synchronous and asynchronous validation at
//! field and form granularity, coalesces concurrent state mutations into
//! atomic batched transitions, and drives a submission lifecycle with
//! guaranteed cleanup on every exit path.
//!
//! The engine is rendering-agnostic: a binding layer mounts [`Field`]
//! controllers against a [`Form`] handle (explicit dependency passing, no
//! ambient context), feeds user interaction into the field handlers, and
//! renders from the aggregate read APIs.

pub mod config;
pub mod error;
pub mod field;
pub mod field_array;
pub mod form;
pub mod id;
pub mod merge;
pub mod scheduler;
pub mod validate;

pub use config::{FormConfig, FormOptions};
pub use error::{FormError, FormResult};
pub use field::{Field, FieldMeta, FieldOptions, FieldProps};
pub use field_array::{ArraySlot, FieldArray, SlotSeed};
pub use form::{
	ComputedProps, FieldHandle, FieldRegistration, FieldSnapshot, Form, FormSnapshot, FormState,
	SubmitOutcome,
};
pub use id::{FieldId, SlotId};
pub use scheduler::{BatchScheduler, QUIESCENCE_WINDOW};
pub use validate::{SubmitHandler, Validation, Validator, submit_handler, validator};
