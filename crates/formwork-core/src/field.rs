//! Field controller
//!
//! A field controller owns the local state slice for one named input
//! (value, touched, error, focus, validation flag) and mirrors the parts
//! the form cares about into shared form state through the batched
//! scheduler. The form never reaches into a field directly — at
//! registration the field hands over a bundle of mutation callbacks backed
//! by weak references, so a callback arriving after unmount is a silent
//! no-op.

use crate::config::FormOptions;
use crate::form::{FieldHandle, FieldRegistration, FieldSnapshot, Form};
use crate::id::FieldId;
use crate::validate::{Validation, Validator, normalize};
use formwork_paths as paths;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Construction options for [`Field::mount`].
#[derive(Clone, Default)]
pub struct FieldOptions {
	/// Dot-path name the field registers under.
	pub name: String,
	/// Overrides the form's initial-values tree for this field.
	pub initial_value: Option<Value>,
	/// Field-level validator; takes precedence over the form-level
	/// validator for this field's path.
	pub validate: Option<Validator>,
	/// Per-field override of the form's unregister policy.
	pub should_unregister: Option<bool>,
	/// Propagate changes to the form even while focused.
	pub send_immediate: bool,
}

impl FieldOptions {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Self::default()
		}
	}

	pub fn with_initial_value(mut self, value: Value) -> Self {
		self.initial_value = Some(value);
		self
	}

	pub fn with_validate<F>(mut self, validate: F) -> Self
	where
		F: Fn(&Value, &Form) -> Validation + Send + Sync + 'static,
	{
		self.validate = Some(Arc::new(validate));
		self
	}

	pub fn with_should_unregister(mut self, flag: bool) -> Self {
		self.should_unregister = Some(flag);
		self
	}

	pub fn with_send_immediate(mut self, flag: bool) -> Self {
		self.send_immediate = flag;
		self
	}
}

/// Field state surfaced to the binding layer alongside the value.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMeta {
	pub error: Option<Value>,
	pub touched: bool,
	pub focused: bool,
	pub is_validating: bool,
}

/// Point-in-time props bundle for rendering one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldProps {
	pub name: String,
	pub value: Value,
	pub meta: FieldMeta,
}

#[derive(Clone)]
struct FieldState {
	name: String,
	value: Value,
	touched: bool,
	error: Option<Value>,
	focused: bool,
	is_validating: bool,
}

struct FieldShared {
	form: Form,
	id: FieldId,
	send_immediate: bool,
	validate: Option<Validator>,
	/// Explicit per-field unregister override, re-resolved when changed.
	explicit_unregister: Mutex<Option<bool>>,
	unregister_on_unmount: AtomicBool,
	/// Generation counter for validation runs; deferred results from a
	/// superseded generation are discarded instead of applied.
	validation_epoch: AtomicU64,
	state: Mutex<FieldState>,
}

/// A mounted field controller. Owning it keeps the registered mutation API
/// alive; see [`Field::unmount`].
pub struct Field {
	shared: Arc<FieldShared>,
}

impl Field {
	/// Computes the field's initial state, registers it with the form and
	/// — under the validate-on-mount policy — runs a first validation.
	///
	/// The initial value is the explicit override, else the value at the
	/// field's path in the form's initial-values tree, else the empty
	/// string. The future resolves once the registration is visible in
	/// committed form state.
	pub async fn mount(form: &Form, options: FieldOptions) -> Field {
		let config = form.config();
		let initial_value = options
			.initial_value
			.clone()
			.filter(|value| !value.is_null())
			.or_else(|| {
				paths::get(&config.initial_values, &options.name)
					.filter(|value| !value.is_null())
					.cloned()
			})
			.unwrap_or_else(|| Value::String(String::new()));
		let touched = config.options.validate_on_mount;
		let resolved_unregister = options
			.should_unregister
			.unwrap_or(config.options.should_unregister);

		let shared = Arc::new(FieldShared {
			form: form.clone(),
			id: FieldId::new(),
			send_immediate: options.send_immediate,
			validate: options.validate.clone(),
			explicit_unregister: Mutex::new(options.should_unregister),
			unregister_on_unmount: AtomicBool::new(resolved_unregister),
			validation_epoch: AtomicU64::new(0),
			state: Mutex::new(FieldState {
				name: options.name.clone(),
				value: initial_value.clone(),
				touched,
				error: None,
				focused: false,
				is_validating: false,
			}),
		});
		let field = Field { shared };
		field.register(initial_value, touched, None).await;

		if form.options().validate_on_mount {
			let error = field.shared.run_validation().await;
			field.shared.send_error(error).await;
		}
		field
	}

	pub fn id(&self) -> FieldId {
		self.shared.id
	}

	pub fn name(&self) -> String {
		self.shared.state.lock().name.clone()
	}

	pub fn props(&self) -> FieldProps {
		let state = self.shared.state.lock();
		FieldProps {
			name: state.name.clone(),
			value: state.value.clone(),
			meta: FieldMeta {
				error: state.error.clone(),
				touched: state.touched,
				focused: state.focused,
				is_validating: state.is_validating,
			},
		}
	}

	/// Marks the field focused. Purely local; nothing propagates to the
	/// form until change/blur.
	pub fn on_focus(&self) {
		self.shared.write_local(|state| state.focused = true);
	}

	/// Applies a new value from user interaction.
	///
	/// Touches per the touch-on-change policy and validates per the
	/// validate-on-change policy. While the field is focused and
	/// send-immediate is off, propagation to the form waits for blur;
	/// validation still runs locally so the field's own meta is current.
	pub async fn on_change(&self, value: Value) {
		let options = *self.shared.form.options();
		let (focused, already_touched) = {
			let state = self.shared.state.lock();
			(state.focused, state.touched)
		};
		let touched = already_touched || options.touch_on_change;
		self.shared.write_local(|state| {
			state.value = value.clone();
			state.touched = touched;
		});

		let propagate = self.shared.send_immediate || !focused;
		if propagate {
			let send_value = self.shared.send_value(value);
			let send_touched = self.shared.send_touched(touched);
			if options.validate_on_change {
				let error = self.shared.run_validation().await;
				futures::join!(send_value, send_touched, self.shared.send_error(error));
			} else {
				futures::join!(send_value, send_touched);
			}
		} else if options.validate_on_change {
			let _ = self.shared.run_validation().await;
		}
	}

	/// Always propagates value and touched, clears focus, and validates
	/// per the validate-on-blur policy (otherwise re-sends the current
	/// error so a change deferred during focus still reaches the form).
	pub async fn on_blur(&self) {
		let options = *self.shared.form.options();
		let (value, already_touched, current_error) = {
			let state = self.shared.state.lock();
			(state.value.clone(), state.touched, state.error.clone())
		};
		let touched = already_touched || options.touch_on_blur;
		self.shared.write_local(|state| {
			state.touched = touched;
			state.focused = false;
		});

		let send_value = self.shared.send_value(value);
		let send_touched = self.shared.send_touched(touched);
		if options.validate_on_blur {
			let error = self.shared.run_validation().await;
			futures::join!(send_value, send_touched, self.shared.send_error(error));
		} else {
			futures::join!(send_value, send_touched, self.shared.send_error(current_error));
		}
	}

	/// Renames the field: unregisters the old name per the unregister
	/// policy and re-registers under the new one, carrying the current
	/// value/touched/error. The current value becomes the new
	/// registration's initial value.
	pub async fn set_name(&self, name: impl Into<String>) {
		let name = name.into();
		let (old_name, value, touched, error) = {
			let state = self.shared.state.lock();
			(
				state.name.clone(),
				state.value.clone(),
				state.touched,
				state.error.clone(),
			)
		};
		if name == old_name {
			return;
		}
		tracing::debug!(from = %old_name, to = %name, id = %self.shared.id, "renaming field");
		let unregister = self
			.shared
			.unregister_on_unmount
			.load(Ordering::Acquire)
			.then(|| self.shared.form.unregister_field(self.shared.id));
		self.shared.write_local(|state| state.name = name);
		match unregister {
			Some(unregister) => {
				futures::join!(unregister, self.register(value, touched, error));
			}
			None => self.register(value, touched, error).await,
		}
	}

	/// Updates the explicit unregister override; `None` falls back to the
	/// form-wide default. Re-resolved only when the override changes.
	pub fn set_should_unregister(&self, flag: Option<bool>) {
		let mut explicit = self.shared.explicit_unregister.lock();
		if *explicit == flag {
			return;
		}
		*explicit = flag;
		let resolved = flag.unwrap_or(self.shared.form.options().should_unregister);
		self.shared
			.unregister_on_unmount
			.store(resolved, Ordering::Release);
	}

	/// Unmounts the field. Per the unregister policy the registration is
	/// dropped; either way the mutation API handed to the form goes dead,
	/// so any in-flight validation resolving afterwards cannot write back.
	pub async fn unmount(self) {
		if self.shared.unregister_on_unmount.load(Ordering::Acquire) {
			self.shared.form.unregister_field(self.shared.id).await;
		}
	}

	async fn register(&self, initial: Value, touched: bool, error: Option<Value>) {
		let name = self.shared.state.lock().name.clone();
		let registration = FieldRegistration {
			id: self.shared.id,
			initial_value: initial.clone(),
			value: initial.clone(),
			touched,
			error,
			validate: self.shared.validate.clone(),
			handle: FieldShared::handle(&self.shared, initial),
		};
		self.shared.form.register_field(&name, registration).await;
	}
}

impl FieldShared {
	fn write_local(&self, write: impl FnOnce(&mut FieldState)) {
		write(&mut self.state.lock());
	}

	fn send_value(&self, value: Value) -> BoxFuture<'static, ()> {
		let name = self.state.lock().name.clone();
		self.form.set_form_state(move |mut state| {
			if let Some(reg) = state.fields.get_mut(&name) {
				reg.value = value;
			}
			state
		})
	}

	fn send_touched(&self, touched: bool) -> BoxFuture<'static, ()> {
		let name = self.state.lock().name.clone();
		self.form.set_form_state(move |mut state| {
			if let Some(reg) = state.fields.get_mut(&name) {
				reg.touched = touched;
			}
			state
		})
	}

	fn send_error(&self, error: Option<Value>) -> BoxFuture<'static, ()> {
		let name = self.state.lock().name.clone();
		self.form.set_form_state(move |mut state| {
			if let Some(reg) = state.fields.get_mut(&name) {
				reg.error = error;
			}
			state
		})
	}

	/// Runs the field-level validator, or the form-level validator
	/// restricted to this field's path when no field validator exists.
	///
	/// A deferred verdict raises the local `is_validating` flag while
	/// pending. Each run takes a fresh generation; if another run started
	/// in the meantime the stale verdict is discarded and the current
	/// error is returned instead.
	async fn run_validation(&self) -> Option<Value> {
		let epoch = self.validation_epoch.fetch_add(1, Ordering::AcqRel) + 1;
		let (name, value) = {
			let state = self.state.lock();
			(state.name.clone(), state.value.clone())
		};

		let outcome = if let Some(validate) = &self.validate {
			Some(validate(&value, &self.form))
		} else if let Some(validate_form) = self.form.config().validate.clone() {
			let probe = paths::set(&Value::Object(Default::default()), &name, value);
			let scoped = name.clone();
			Some(match validate_form(&probe, &self.form) {
				Validation::Immediate(errors) => Validation::Immediate(
					paths::get(&errors, &scoped).cloned().unwrap_or(Value::Null),
				),
				Validation::Deferred(future) => Validation::Deferred(Box::pin(async move {
					let errors = future.await;
					paths::get(&errors, &scoped).cloned().unwrap_or(Value::Null)
				})),
			})
		} else {
			None
		};

		match outcome {
			None => self.state.lock().error.clone(),
			Some(Validation::Immediate(raw)) => {
				let error = normalize(raw);
				self.write_local(|state| state.error = error.clone());
				error
			}
			Some(Validation::Deferred(future)) => {
				self.write_local(|state| state.is_validating = true);
				let error = normalize(future.await);
				if self.validation_epoch.load(Ordering::Acquire) == epoch {
					self.write_local(|state| {
						state.error = error.clone();
						state.is_validating = false;
					});
					error
				} else {
					tracing::trace!(field = %name, "discarding superseded validation result");
					self.state.lock().error.clone()
				}
			}
		}
	}

	/// Builds the mutation API handed to the form. Every callback holds a
	/// weak reference; after the owning [`Field`] is dropped the callbacks
	/// resolve immediately without touching any state.
	fn handle(shared: &Arc<Self>, initial_value: Value) -> FieldHandle {
		let weak = Arc::downgrade(shared);

		let set_value: crate::form::SetValueFn = {
			let weak = weak.clone();
			Arc::new(move |value, should_validate| {
				let weak = weak.clone();
				Box::pin(async move {
					match weak.upgrade() {
						Some(shared) => shared.apply_set_value(value, should_validate).await,
						None => value,
					}
				})
			})
		};

		let set_touched: crate::form::SetTouchedFn = {
			let weak = weak.clone();
			Arc::new(move |touched, should_validate| {
				let weak = weak.clone();
				Box::pin(async move {
					match weak.upgrade() {
						Some(shared) => shared.apply_set_touched(touched, should_validate).await,
						None => touched,
					}
				})
			})
		};

		let set_error: crate::form::SetErrorFn = {
			let weak = weak.clone();
			Arc::new(move |error, should_touch| {
				let weak = weak.clone();
				Box::pin(async move {
					match weak.upgrade() {
						Some(shared) => shared.apply_set_error(error, should_touch).await,
						None => error,
					}
				})
			})
		};

		let reset: crate::form::ResetFn = {
			let weak = weak.clone();
			Arc::new(move |value, should_validate| {
				let weak = weak.clone();
				let initial_value = initial_value.clone();
				Box::pin(async move {
					match weak.upgrade() {
						Some(shared) => {
							shared
								.apply_reset(value, should_validate, initial_value)
								.await
						}
						None => FieldSnapshot {
							value: value.unwrap_or(initial_value),
							touched: false,
							error: None,
						},
					}
				})
			})
		};

		FieldHandle {
			set_value,
			set_touched,
			set_error,
			reset,
		}
	}

	async fn apply_set_value(self: Arc<Self>, value: Value, should_validate: Option<bool>) -> Value {
		let should_validate = should_validate.unwrap_or(self.form.options().validate_on_change);
		self.write_local(|state| state.value = value.clone());
		let send_value = self.send_value(value.clone());
		if should_validate {
			let error = self.run_validation().await;
			futures::join!(send_value, self.send_error(error));
		} else {
			send_value.await;
		}
		value
	}

	async fn apply_set_touched(
		self: Arc<Self>,
		touched: bool,
		should_validate: Option<bool>,
	) -> bool {
		let should_validate = should_validate.unwrap_or(self.form.options().validate_on_blur);
		self.write_local(|state| state.touched = touched);
		let send_touched = self.send_touched(touched);
		if should_validate {
			let error = self.run_validation().await;
			futures::join!(send_touched, self.send_error(error));
		} else {
			send_touched.await;
		}
		touched
	}

	/// Sets the error directly, bypassing validators. Only ever marks
	/// touched, never clears it.
	async fn apply_set_error(
		self: Arc<Self>,
		error: Option<Value>,
		should_touch: Option<bool>,
	) -> Option<Value> {
		let should_touch = should_touch.unwrap_or(true);
		self.write_local(|state| {
			state.error = error.clone();
			if should_touch {
				state.touched = true;
			}
		});
		let send_error = self.send_error(error.clone());
		if should_touch {
			futures::join!(self.send_touched(true), send_error);
		} else {
			send_error.await;
		}
		error
	}

	async fn apply_reset(
		self: Arc<Self>,
		value: Option<Value>,
		should_validate: Option<bool>,
		initial_value: Value,
	) -> FieldSnapshot {
		let options: FormOptions = *self.form.options();
		let should_validate = should_validate.unwrap_or(options.validate_on_mount);
		let value = value
			.filter(|replacement| !replacement.is_null())
			.unwrap_or(initial_value);
		let touched = should_validate && options.validate_on_mount;
		self.write_local(|state| {
			state.value = value.clone();
			state.touched = touched;
			state.error = None;
		});
		let send_value = self.send_value(value.clone());
		let send_touched = self.send_touched(touched);
		let clear_error = self.send_error(None);
		if should_validate {
			let error = self.run_validation().await;
			futures::join!(
				send_value,
				send_touched,
				clear_error,
				self.send_error(error.clone())
			);
			FieldSnapshot {
				value,
				touched,
				error,
			}
		} else {
			futures::join!(send_value, send_touched, clear_error);
			FieldSnapshot {
				value,
				touched,
				error: None,
			}
		}
	}
}
