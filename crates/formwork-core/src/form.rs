//! Form controller and submission state machine
//!
//! The form controller owns the field registry and is the only writer of
//! shared form state; every mutation funnels through the batched update
//! scheduler. Field controllers hand it a bundle of mutation callbacks at
//! registration and the controller calls back into those for programmatic
//! form-level operations, so field-local state and shared state never
//! diverge in ownership.

use crate::config::{FormConfig, FormOptions};
use crate::error::{FormError, FormResult};
use crate::id::FieldId;
use crate::merge;
use crate::scheduler::BatchScheduler;
use crate::validate::{Validation, Validator, normalize};
use formwork_paths as paths;
use futures::future::{BoxFuture, join_all};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub type SetValueFn = Arc<dyn Fn(Value, Option<bool>) -> BoxFuture<'static, Value> + Send + Sync>;
pub type SetTouchedFn = Arc<dyn Fn(bool, Option<bool>) -> BoxFuture<'static, bool> + Send + Sync>;
pub type SetErrorFn =
	Arc<dyn Fn(Option<Value>, Option<bool>) -> BoxFuture<'static, Option<Value>> + Send + Sync>;
pub type ResetFn =
	Arc<dyn Fn(Option<Value>, Option<bool>) -> BoxFuture<'static, FieldSnapshot> + Send + Sync>;

/// What a field's `reset` resolves with.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSnapshot {
	pub value: Value,
	pub touched: bool,
	pub error: Option<Value>,
}

/// The mutation API a field controller hands to the form at registration.
/// The closures hold weak references into the field controller; once the
/// field unmounts they become silent no-ops.
#[derive(Clone)]
pub struct FieldHandle {
	pub set_value: SetValueFn,
	pub set_touched: SetTouchedFn,
	pub set_error: SetErrorFn,
	pub reset: ResetFn,
}

/// One entry in the field registry.
#[derive(Clone)]
pub struct FieldRegistration {
	pub id: FieldId,
	pub initial_value: Value,
	pub value: Value,
	pub touched: bool,
	pub error: Option<Value>,
	pub validate: Option<Validator>,
	pub handle: FieldHandle,
}

/// Shared form state, transitioned exclusively through the batched
/// scheduler. `values`/`touched`/`errors` are never stored here — they are
/// recomputed from the registry on demand.
#[derive(Clone, Default)]
pub struct FormState {
	pub fields: BTreeMap<String, FieldRegistration>,
	pub meta: Option<Value>,
	pub submit_count: u64,
	pub is_submitting: bool,
	pub is_validating: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputedProps {
	/// Current values differ from the registered initial values.
	pub is_dirty: bool,
	/// No registered field currently holds an error.
	pub is_valid: bool,
}

/// A point-in-time aggregate of everything the binding layer renders from.
#[derive(Debug, Clone, PartialEq)]
pub struct FormSnapshot {
	pub values: Value,
	pub touched: Value,
	pub errors: Value,
	pub meta: Option<Value>,
	pub submit_count: u64,
	pub is_submitting: bool,
	pub is_validating: bool,
	pub is_dirty: bool,
	pub is_valid: bool,
}

/// How a [`Form::submit_form`] call concluded, short of a handler error.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
	/// Validation failed, or a submission was already in flight; the
	/// submit handler was not invoked.
	NotSubmitted,
	/// The submit handler ran and produced this value.
	Submitted(Value),
}

fn empty_object() -> Value {
	Value::Object(Map::new())
}

fn values_of(state: &FormState) -> Value {
	state.fields.iter().fold(empty_object(), |tree, (name, reg)| {
		paths::set(&tree, name, reg.value.clone())
	})
}

fn initial_values_of(state: &FormState) -> Value {
	state.fields.iter().fold(empty_object(), |tree, (name, reg)| {
		paths::set(&tree, name, reg.initial_value.clone())
	})
}

fn touched_of(state: &FormState) -> Value {
	state.fields.iter().fold(empty_object(), |tree, (name, reg)| {
		paths::set(&tree, name, Value::Bool(reg.touched))
	})
}

fn errors_of(state: &FormState) -> Value {
	state.fields.iter().fold(empty_object(), |tree, (name, reg)| {
		match &reg.error {
			Some(error) => paths::set(&tree, name, error.clone()),
			None => tree,
		}
	})
}

fn is_valid_in(state: &FormState) -> bool {
	state.fields.values().all(|reg| reg.error.is_none())
}

/// The form controller. Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Form {
	inner: Arc<FormInner>,
}

struct FormInner {
	config: FormConfig,
	state: Arc<RwLock<FormState>>,
	scheduler: BatchScheduler<FormState>,
	/// Submission-in-flight latch, taken at `submit_form` entry so two
	/// unawaited submits cannot both pass the guard.
	submit_latch: AtomicBool,
}

impl Form {
	/// Creates a form controller. Must be called within a tokio runtime
	/// (state transitions are committed by timer tasks).
	pub fn new(config: FormConfig) -> Self {
		let state = Arc::new(RwLock::new(FormState::default()));
		let scheduler = BatchScheduler::new(Arc::clone(&state));
		Self {
			inner: Arc::new(FormInner {
				config,
				state,
				scheduler,
				submit_latch: AtomicBool::new(false),
			}),
		}
	}

	pub fn config(&self) -> &FormConfig {
		&self.inner.config
	}

	pub fn options(&self) -> &FormOptions {
		&self.inner.config.options
	}

	/// Queues a state transition. The returned future resolves once the
	/// transition is visible in committed state; dropping it does not
	/// cancel the transition.
	pub fn set_form_state<F>(&self, transition: F) -> BoxFuture<'static, ()>
	where
		F: FnOnce(FormState) -> FormState + Send + 'static,
	{
		self.inner.scheduler.enqueue(transition)
	}

	/// Registers a field under `name`. A registration already holding the
	/// name is silently replaced — last writer wins.
	pub fn register_field(&self, name: &str, registration: FieldRegistration) -> BoxFuture<'static, ()> {
		tracing::debug!(field = %name, id = %registration.id, "registering field");
		let name = name.to_string();
		self.set_form_state(move |mut state| {
			state.fields.insert(name, registration);
			state
		})
	}

	/// Unregisters by id, not by name, so that a field which changed its
	/// name (or an array slot that shifted index) cannot be dropped by a
	/// stale request targeting the old owner of the name. A stale id is a
	/// no-op.
	pub fn unregister_field(&self, id: FieldId) -> BoxFuture<'static, ()> {
		tracing::debug!(%id, "unregistering field");
		self.set_form_state(move |mut state| {
			let name = state
				.fields
				.iter()
				.find(|(_, reg)| reg.id == id)
				.map(|(name, _)| name.clone());
			if let Some(name) = name {
				state.fields.remove(&name);
			}
			state
		})
	}

	/// Id of the registration currently holding `name`, if any.
	pub fn registration_id(&self, name: &str) -> Option<FieldId> {
		self.inner.state.read().fields.get(name).map(|reg| reg.id)
	}

	/// Current values as a nested tree, expanded from every registered
	/// field's dot-path name.
	pub fn values(&self) -> Value {
		values_of(&self.inner.state.read())
	}

	/// Registration-time initial values as a nested tree.
	pub fn initial_values(&self) -> Value {
		initial_values_of(&self.inner.state.read())
	}

	/// Touched flags as a nested tree.
	pub fn touched(&self) -> Value {
		touched_of(&self.inner.state.read())
	}

	/// Current errors as a nested tree. Contains a path only for fields
	/// whose error is present.
	pub fn errors(&self) -> Value {
		errors_of(&self.inner.state.read())
	}

	pub fn meta(&self) -> Option<Value> {
		self.inner.state.read().meta.clone()
	}

	pub fn submit_count(&self) -> u64 {
		self.inner.state.read().submit_count
	}

	pub fn is_submitting(&self) -> bool {
		self.inner.state.read().is_submitting
	}

	pub fn is_validating(&self) -> bool {
		self.inner.state.read().is_validating
	}

	pub fn computed(&self) -> ComputedProps {
		let state = self.inner.state.read();
		ComputedProps {
			is_dirty: initial_values_of(&state) != values_of(&state),
			is_valid: is_valid_in(&state),
		}
	}

	/// Full aggregate snapshot for the binding layer.
	pub fn state(&self) -> FormSnapshot {
		let state = self.inner.state.read();
		let values = values_of(&state);
		let initial_values = initial_values_of(&state);
		FormSnapshot {
			is_dirty: initial_values != values,
			is_valid: is_valid_in(&state),
			touched: touched_of(&state),
			errors: errors_of(&state),
			meta: state.meta.clone(),
			submit_count: state.submit_count,
			is_submitting: state.is_submitting,
			is_validating: state.is_validating,
			values,
		}
	}

	fn field_handles<T>(&self, pick: impl Fn(&FieldHandle) -> T) -> Vec<(String, T)> {
		let state = self.inner.state.read();
		state
			.fields
			.iter()
			.map(|(name, reg)| (name.clone(), pick(&reg.handle)))
			.collect()
	}

	/// Sets values across all registered fields from a nested tree. With
	/// `merge`, fields whose path is absent from the tree are left alone;
	/// without it they are cleared to null.
	pub async fn set_values(&self, values: &Value, merge: bool, should_validate: Option<bool>) {
		let targets = self.field_handles(|handle| handle.set_value.clone());
		let mut pending = Vec::new();
		for (name, set_value) in targets {
			match paths::get(values, &name).cloned() {
				Some(value) => pending.push(set_value(value, should_validate)),
				None if !merge => pending.push(set_value(Value::Null, should_validate)),
				None => {}
			}
		}
		join_all(pending).await;
	}

	pub async fn set_field_value(
		&self,
		name: &str,
		value: Value,
		should_validate: Option<bool>,
	) -> FormResult<Value> {
		let set_value = self.lookup(name, |handle| handle.set_value.clone())?;
		Ok(set_value(value, should_validate).await)
	}

	/// Applies an error tree across all registered fields. Without `merge`
	/// every field is written (clearing fields absent from the tree); with
	/// `merge` only fields whose incoming error is absent are written.
	pub async fn set_errors(&self, errors: &Value, merge: bool, should_touch: Option<bool>) {
		let targets = self.field_handles(|handle| handle.set_error.clone());
		let mut pending = Vec::new();
		for (name, set_error) in targets {
			let incoming = paths::get(errors, &name).cloned().and_then(normalize);
			if !merge || incoming.is_none() {
				pending.push(set_error(incoming, should_touch));
			}
		}
		join_all(pending).await;
	}

	/// Sets a field's error directly, bypassing its validators. Falsy
	/// error values clear the error.
	pub async fn set_field_error(
		&self,
		name: &str,
		error: Value,
		should_touch: Option<bool>,
	) -> FormResult<Option<Value>> {
		let set_error = self.lookup(name, |handle| handle.set_error.clone())?;
		Ok(set_error(normalize(error), should_touch).await)
	}

	/// Applies touched flags across all registered fields; paths absent
	/// from the tree read as false.
	pub async fn set_touched(&self, touched: &Value, should_validate: Option<bool>) {
		let targets = self.field_handles(|handle| handle.set_touched.clone());
		let pending: Vec<_> = targets
			.into_iter()
			.map(|(name, set_touched)| {
				let flag = paths::get(touched, &name).is_some_and(paths::is_truthy);
				set_touched(flag, should_validate)
			})
			.collect();
		join_all(pending).await;
	}

	pub async fn set_field_touched(
		&self,
		name: &str,
		touched: bool,
		should_validate: Option<bool>,
	) -> FormResult<bool> {
		let set_touched = self.lookup(name, |handle| handle.set_touched.clone())?;
		Ok(set_touched(touched, should_validate).await)
	}

	/// Stores caller-owned metadata on the form state.
	pub fn set_meta(&self, meta: Option<Value>) -> BoxFuture<'static, ()> {
		self.set_form_state(move |mut state| {
			state.meta = meta;
			state
		})
	}

	/// Resets every field to its registration-time initial value (or the
	/// value at its path in `values` when given), clearing errors.
	pub async fn reset_form(
		&self,
		values: Option<&Value>,
		should_validate: Option<bool>,
	) -> Vec<FieldSnapshot> {
		let targets = self.field_handles(|handle| handle.reset.clone());
		let pending: Vec<_> = targets
			.into_iter()
			.map(|(name, reset)| {
				let replacement = values.and_then(|tree| paths::get(tree, &name)).cloned();
				reset(replacement, should_validate)
			})
			.collect();
		join_all(pending).await;
		// Re-read so snapshots reflect the committed batch.
		self.field_snapshots()
	}

	fn field_snapshots(&self) -> Vec<FieldSnapshot> {
		let state = self.inner.state.read();
		state
			.fields
			.values()
			.map(|reg| FieldSnapshot {
				value: reg.value.clone(),
				touched: reg.touched,
				error: reg.error.clone(),
			})
			.collect()
	}

	fn lookup<T>(&self, name: &str, pick: impl Fn(&FieldHandle) -> T) -> FormResult<T> {
		let state = self.inner.state.read();
		state
			.fields
			.get(name)
			.map(|reg| pick(&reg.handle))
			.ok_or_else(|| FormError::UnknownField {
				name: name.to_string(),
			})
	}

	/// Runs every field-level validator and then the form-level validator,
	/// merging the results into one error tree.
	///
	/// Sources merge in sequence order — fields in registry order, the
	/// form validator last — so a field-specific error always wins over a
	/// form-level error for the same path, regardless of which resolved
	/// first.
	pub async fn run_validations(&self) -> Value {
		let _ = self.set_form_state(|mut state| {
			state.is_validating = true;
			state
		});

		enum Source {
			Ready(Value),
			Pending(BoxFuture<'static, Value>),
		}

		let entries: Vec<(String, Value, Option<Validator>)> = {
			let state = self.inner.state.read();
			state
				.fields
				.iter()
				.map(|(name, reg)| (name.clone(), reg.value.clone(), reg.validate.clone()))
				.collect()
		};
		let values = self.values();

		let mut sources = Vec::with_capacity(entries.len() + 1);
		for (name, value, field_validator) in entries {
			match field_validator {
				Some(validate) => match validate(&value, self) {
					Validation::Immediate(error) => {
						sources.push(Source::Ready(paths::set(&empty_object(), &name, error)));
					}
					Validation::Deferred(future) => {
						// Preserve which field the eventual error belongs to.
						sources.push(Source::Pending(Box::pin(async move {
							paths::set(&empty_object(), &name, future.await)
						})));
					}
				},
				// Fields without a validator still contribute an entry so
				// their position in the merge sequence is stable.
				None => sources.push(Source::Ready(paths::set(&empty_object(), &name, Value::Null))),
			}
		}
		if let Some(validate) = self.inner.config.validate.clone() {
			match validate(&values, self) {
				Validation::Immediate(errors) => sources.push(Source::Ready(errors)),
				Validation::Deferred(future) => sources.push(Source::Pending(future)),
			}
		}

		let resolved = join_all(sources.into_iter().map(|source| async move {
			match source {
				Source::Ready(errors) => errors,
				Source::Pending(future) => future.await,
			}
		}))
		.await;

		let merged = merge::merge_error_sources(resolved);
		let _ = self.set_form_state(|mut state| {
			state.is_validating = false;
			state
		});
		paths::unflatten(&merged)
	}

	/// Drives the full submission protocol.
	///
	/// Touches every field and bumps the submit counter, validates,
	/// applies the merged errors, and — only when the error set is empty —
	/// invokes the submit handler. `is_submitting` and the in-flight latch
	/// are restored on every exit path before this resolves; a handler
	/// error propagates only after that cleanup.
	pub async fn submit_form(&self) -> anyhow::Result<SubmitOutcome> {
		if self.inner.state.read().is_submitting {
			return Ok(SubmitOutcome::NotSubmitted);
		}
		if self.inner.submit_latch.swap(true, Ordering::AcqRel) {
			return Ok(SubmitOutcome::NotSubmitted);
		}

		tracing::debug!(submit_count = self.submit_count() + 1, "submission started");
		self.start_submit().await;
		let errors = self.run_validations().await;
		self.set_errors(&errors, false, Some(true)).await;
		self.execute_submit().await
	}

	/// Marks every field touched (without validating) and increments the
	/// submit counter as one batched transition.
	async fn start_submit(&self) {
		let all_touched = {
			let state = self.inner.state.read();
			state.fields.keys().fold(empty_object(), |tree, name| {
				paths::set(&tree, name, Value::Bool(true))
			})
		};
		let bump = self.set_form_state(|mut state| {
			state.submit_count += 1;
			state
		});
		let touch = self.set_touched(&all_touched, Some(false));
		futures::join!(touch, bump);
	}

	async fn execute_submit(&self) -> anyhow::Result<SubmitOutcome> {
		let (values, is_valid) = {
			let state = self.inner.state.read();
			(values_of(&state), is_valid_in(&state))
		};

		let handler_result = if is_valid {
			let _ = self.set_form_state(|mut state| {
				state.is_submitting = true;
				state
			});
			match self.inner.config.on_submit.clone() {
				Some(on_submit) => Some(on_submit(values, self.clone()).await),
				None => Some(Ok(Value::Null)),
			}
		} else {
			None
		};

		// Guaranteed release: whatever happened above, submission state is
		// restored before the result (or the handler's error) surfaces.
		self.set_form_state(|mut state| {
			state.is_submitting = false;
			state
		})
		.await;
		self.inner.submit_latch.store(false, Ordering::Release);

		match handler_result {
			None => {
				tracing::debug!("submission rejected by validation");
				Ok(SubmitOutcome::NotSubmitted)
			}
			Some(Ok(value)) => Ok(SubmitOutcome::Submitted(value)),
			Some(Err(error)) => {
				tracing::debug!(%error, "submit handler failed");
				Err(error)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn noop_handle() -> FieldHandle {
		FieldHandle {
			set_value: Arc::new(|value, _| Box::pin(async move { value })),
			set_touched: Arc::new(|touched, _| Box::pin(async move { touched })),
			set_error: Arc::new(|error, _| Box::pin(async move { error })),
			reset: Arc::new(|value, _| {
				Box::pin(async move {
					FieldSnapshot {
						value: value.unwrap_or(Value::Null),
						touched: false,
						error: None,
					}
				})
			}),
		}
	}

	fn registration(value: Value, error: Option<Value>) -> FieldRegistration {
		FieldRegistration {
			id: FieldId::new(),
			initial_value: value.clone(),
			value,
			touched: false,
			error,
			validate: None,
			handle: noop_handle(),
		}
	}

	#[test]
	fn aggregates_expand_dot_paths() {
		let mut state = FormState::default();
		state
			.fields
			.insert("a".into(), registration(json!("x"), None));
		state
			.fields
			.insert("b.c".into(), registration(json!(9), Some(json!("bad"))));
		assert_eq!(values_of(&state), json!({"a": "x", "b": {"c": 9}}));
		assert_eq!(errors_of(&state), json!({"b": {"c": "bad"}}));
		assert_eq!(touched_of(&state), json!({"a": false, "b": {"c": false}}));
		assert!(!is_valid_in(&state));
	}

	#[test]
	fn errors_tree_omits_clean_fields() {
		let mut state = FormState::default();
		state
			.fields
			.insert("clean".into(), registration(json!(1), None));
		assert_eq!(errors_of(&state), json!({}));
		assert!(is_valid_in(&state));
	}
}
