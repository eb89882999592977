//! Field array controller
//!
//! An ordered, dynamically resizable group of field slots sharing an
//! array-style name prefix. Reordering operations act on slot identity,
//! never on field registrations directly: a field observes its new index
//! only because its rendered name `"<array>.<index>"` changes, and the
//! field controller's rename protocol decides whether state survives the
//! shift (per the unregister policy).

use crate::field::FieldOptions;
use crate::form::Form;
use crate::id::SlotId;
use crate::validate::{Validation, Validator};
use formwork_paths as paths;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// Seed applied when a field controller mounts into the slot.
#[derive(Clone, Default)]
pub struct SlotSeed {
	pub initial_value: Option<Value>,
	pub validate: Option<Validator>,
}

impl SlotSeed {
	pub fn new() -> Self {
		Self::default()
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
}

/// One slot in the array. The id is allocated at slot creation and is
/// independent of whatever field registration mounts into the slot.
#[derive(Clone)]
pub struct ArraySlot {
	pub id: SlotId,
	pub seed: SlotSeed,
}

impl ArraySlot {
	fn fresh(seed: SlotSeed) -> Self {
		Self {
			id: SlotId::new(),
			seed,
		}
	}
}

impl PartialEq for ArraySlot {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
			&& self.seed.initial_value == other.seed.initial_value
			&& match (&self.seed.validate, &other.seed.validate) {
				(None, None) => true,
				(Some(a), Some(b)) => Arc::ptr_eq(a, b),
				_ => false,
			}
	}
}

struct ArrayState {
	slots: Vec<ArraySlot>,
	/// Captured at construction or last reset; backs `is_dirty`.
	baseline: Vec<ArraySlot>,
}

/// Controller for one field array.
pub struct FieldArray {
	form: Form,
	name: String,
	state: Mutex<ArrayState>,
}

impl FieldArray {
	/// Creates the controller with one slot per seed, extended to the
	/// length of the form's current value array at `name`. Where the form
	/// already holds a value for an index, it becomes the slot's seed
	/// value.
	pub fn new(form: &Form, name: impl Into<String>, seeds: Vec<SlotSeed>) -> Self {
		let name = name.into();
		let current: Vec<Value> = paths::get(&form.values(), &name)
			.and_then(Value::as_array)
			.cloned()
			.unwrap_or_default();
		let len = seeds.len().max(current.len());
		let slots: Vec<ArraySlot> = (0..len)
			.map(|index| {
				let mut seed = seeds.get(index).cloned().unwrap_or_default();
				if let Some(value) = current.get(index).filter(|value| !value.is_null()) {
					seed.initial_value = Some(value.clone());
				}
				ArraySlot::fresh(seed)
			})
			.collect();
		Self {
			form: form.clone(),
			name,
			state: Mutex::new(ArrayState {
				baseline: slots.clone(),
				slots,
			}),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Snapshot of the current slot sequence.
	pub fn slots(&self) -> Vec<ArraySlot> {
		self.state.lock().slots.clone()
	}

	/// True iff the slot sequence differs structurally from the baseline
	/// captured at construction or last [`reset`](Self::reset).
	pub fn is_dirty(&self) -> bool {
		let state = self.state.lock();
		state.slots != state.baseline
	}

	/// Appends a fresh slot.
	pub fn push(&self, seed: SlotSeed) {
		self.state.lock().slots.push(ArraySlot::fresh(seed));
	}

	/// Removes the last slot, unregistering the field registration that
	/// currently backs it.
	pub async fn pop(&self) -> Option<ArraySlot> {
		let (slot, index) = {
			let mut state = self.state.lock();
			let slot = state.slots.pop()?;
			(slot, state.slots.len())
		};
		self.unregister_slot(index).await;
		Some(slot)
	}

	/// Prepends a fresh slot; every existing slot's rendered index shifts
	/// up by one.
	pub fn unshift(&self, seed: SlotSeed) {
		self.state.lock().slots.insert(0, ArraySlot::fresh(seed));
	}

	/// Swaps two slots. Out-of-range indices are a no-op.
	pub fn swap(&self, a: usize, b: usize) {
		let mut state = self.state.lock();
		if a < state.slots.len() && b < state.slots.len() {
			state.slots.swap(a, b);
		}
	}

	/// Relocates the slot at `from` to position `to`. Out-of-range `from`
	/// is a no-op; `to` clamps to the end.
	pub fn move_slot(&self, from: usize, to: usize) {
		let mut state = self.state.lock();
		if from >= state.slots.len() {
			return;
		}
		let slot = state.slots.remove(from);
		let to = to.min(state.slots.len());
		state.slots.insert(to, slot);
	}

	/// Inserts a fresh slot at `index` (clamped to the end).
	pub fn insert(&self, index: usize, seed: SlotSeed) {
		let mut state = self.state.lock();
		let index = index.min(state.slots.len());
		state.slots.insert(index, ArraySlot::fresh(seed));
	}

	/// Replaces the slot at `index` with a fresh one (fresh id included).
	/// Out-of-range indices are a no-op.
	pub fn replace(&self, index: usize, seed: SlotSeed) {
		let mut state = self.state.lock();
		if index < state.slots.len() {
			state.slots[index] = ArraySlot::fresh(seed);
		}
	}

	/// Removes the slot at `index`, unregistering the field registration
	/// that currently backs it. Out-of-range indices are a no-op.
	pub async fn remove(&self, index: usize) -> Option<ArraySlot> {
		let slot = {
			let mut state = self.state.lock();
			if index >= state.slots.len() {
				return None;
			}
			state.slots.remove(index)
		};
		self.unregister_slot(index).await;
		Some(slot)
	}

	/// Replaces both the current sequence and the dirty baseline with
	/// fresh slots built from `seeds` (or the construction seeds).
	pub fn reset(&self, seeds: Option<Vec<SlotSeed>>) {
		let mut state = self.state.lock();
		let seeds = seeds
			.unwrap_or_else(|| state.baseline.iter().map(|slot| slot.seed.clone()).collect());
		let slots: Vec<ArraySlot> = seeds.into_iter().map(ArraySlot::fresh).collect();
		state.baseline = slots.clone();
		state.slots = slots;
	}

	/// Mount options for the field backing `slot` at `index`: rendered
	/// name `"<array>.<index>"` plus the slot's seed. Reordering renames
	/// every shifted slot's field through exactly this derivation.
	pub fn field_options(&self, slot: &ArraySlot, index: usize) -> FieldOptions {
		let mut options = FieldOptions::new(format!("{}.{}", self.name, index));
		options.initial_value = slot.seed.initial_value.clone();
		options.validate = slot.seed.validate.clone();
		options
	}

	/// Resolves the registration currently rendered at `index` and asks
	/// the form to drop it, so a slot leaving the sequence does not leave
	/// an orphaned registration behind.
	async fn unregister_slot(&self, index: usize) {
		let rendered = format!("{}.{}", self.name, index);
		if let Some(id) = self.form.registration_id(&rendered) {
			tracing::debug!(slot = %rendered, %id, "unregistering removed slot");
			self.form.unregister_field(id).await;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn slot_values(slots: &[ArraySlot]) -> Vec<Option<Value>> {
		slots
			.iter()
			.map(|slot| slot.seed.initial_value.clone())
			.collect()
	}

	#[tokio::test(start_paused = true)]
	async fn swap_and_move_reorder_identities() {
		let form = Form::new(crate::FormConfig::new());
		let array = FieldArray::new(
			&form,
			"rows",
			vec![
				SlotSeed::new().with_initial_value(json!("a")),
				SlotSeed::new().with_initial_value(json!("b")),
				SlotSeed::new().with_initial_value(json!("c")),
			],
		);
		let before = array.slots();

		array.swap(0, 2);
		assert_eq!(
			slot_values(&array.slots()),
			vec![Some(json!("c")), Some(json!("b")), Some(json!("a"))]
		);
		assert_eq!(array.slots()[0].id, before[2].id);

		array.move_slot(2, 0);
		assert_eq!(
			slot_values(&array.slots()),
			vec![Some(json!("a")), Some(json!("c")), Some(json!("b"))]
		);
	}

	#[tokio::test(start_paused = true)]
	async fn out_of_range_operations_are_no_ops() {
		let form = Form::new(crate::FormConfig::new());
		let array = FieldArray::new(&form, "rows", vec![SlotSeed::new()]);
		array.swap(0, 5);
		array.move_slot(9, 0);
		array.replace(3, SlotSeed::new());
		assert_eq!(array.remove(7).await.map(|slot| slot.id), None);
		assert_eq!(array.slots().len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn reset_restores_baseline_and_clears_dirty() {
		let form = Form::new(crate::FormConfig::new());
		let array = FieldArray::new(&form, "rows", vec![SlotSeed::new()]);
		array.push(SlotSeed::new());
		assert!(array.is_dirty());
		array.reset(None);
		assert!(!array.is_dirty());
		assert_eq!(array.slots().len(), 1);
	}
}
