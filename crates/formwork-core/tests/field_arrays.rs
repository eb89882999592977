//! Field arrays: slot identity, reordering, rename-driven re-registration

use formwork_core::{Field, FieldArray, FieldOptions, Form, FormConfig, SlotSeed};
use serde_json::json;

async fn mount_slots(form: &Form, array: &FieldArray) -> Vec<Field> {
	let mut fields = Vec::new();
	for (index, slot) in array.slots().iter().enumerate() {
		fields.push(Field::mount(form, array.field_options(slot, index)).await);
	}
	fields
}

#[tokio::test(start_paused = true)]
async fn slots_render_indexed_names() {
	let form = Form::new(FormConfig::new());
	let array = FieldArray::new(
		&form,
		"rows",
		vec![
			SlotSeed::new().with_initial_value(json!("a")),
			SlotSeed::new().with_initial_value(json!("b")),
		],
	);
	let fields = mount_slots(&form, &array).await;

	assert_eq!(fields[0].name(), "rows.0");
	assert_eq!(fields[1].name(), "rows.1");
	assert_eq!(form.values(), json!({"rows": ["a", "b"]}));
}

#[tokio::test(start_paused = true)]
async fn swap_then_remove_keeps_the_slot_originally_at_index_one() {
	let form = Form::new(FormConfig::new());
	let array = FieldArray::new(
		&form,
		"rows",
		vec![SlotSeed::new(), SlotSeed::new()],
	);
	let original = array.slots();

	array.swap(0, 1);
	array.remove(1).await;

	let remaining = array.slots();
	assert_eq!(remaining.len(), 1);
	assert_eq!(remaining[0].id, original[1].id);
}

#[tokio::test(start_paused = true)]
async fn remove_unregisters_the_backing_registration() {
	let form = Form::new(FormConfig::new());
	let array = FieldArray::new(
		&form,
		"rows",
		vec![
			SlotSeed::new().with_initial_value(json!("keep")),
			SlotSeed::new().with_initial_value(json!("drop")),
		],
	);
	let _fields = mount_slots(&form, &array).await;
	assert_eq!(form.values(), json!({"rows": ["keep", "drop"]}));

	array.remove(1).await;

	assert_eq!(array.slots().len(), 1);
	assert_eq!(form.registration_id("rows.1"), None);
	assert_eq!(form.values(), json!({"rows": ["keep"]}));
}

#[tokio::test(start_paused = true)]
async fn pop_unregisters_the_last_registration() {
	let form = Form::new(FormConfig::new());
	let array = FieldArray::new(
		&form,
		"rows",
		vec![
			SlotSeed::new().with_initial_value(json!("first")),
			SlotSeed::new().with_initial_value(json!("last")),
		],
	);
	let _fields = mount_slots(&form, &array).await;

	let popped = array.pop().await;
	assert!(popped.is_some());
	assert_eq!(form.registration_id("rows.1"), None);
	assert_eq!(form.values(), json!({"rows": ["first"]}));
}

#[tokio::test(start_paused = true)]
async fn swap_renames_preserve_field_state_through_identity() {
	let form = Form::new(FormConfig::new());
	let array = FieldArray::new(
		&form,
		"rows",
		vec![
			SlotSeed::new().with_initial_value(json!("a")),
			SlotSeed::new().with_initial_value(json!("b")),
		],
	);
	let fields = mount_slots(&form, &array).await;

	array.swap(0, 1);
	// The binding layer re-renders: each mounted field picks up the name
	// of its slot's new index. Re-registration is keyed by id, so the
	// second rename's stale unregister cannot drop the first field.
	fields[0].set_name("rows.1").await;
	fields[1].set_name("rows.0").await;

	assert_eq!(form.values(), json!({"rows": ["b", "a"]}));
	assert_eq!(form.registration_id("rows.1"), Some(fields[0].id()));
	assert_eq!(form.registration_id("rows.0"), Some(fields[1].id()));
}

#[tokio::test(start_paused = true)]
async fn construction_sizes_to_current_form_values() {
	let form = Form::new(FormConfig::new());
	let _tag0 = Field::mount(
		&form,
		FieldOptions::new("tags.0").with_initial_value(json!("existing")),
	)
	.await;

	let array = FieldArray::new(&form, "tags", Vec::new());
	let slots = array.slots();
	assert_eq!(slots.len(), 1);
	assert_eq!(slots[0].seed.initial_value, Some(json!("existing")));
}

#[tokio::test(start_paused = true)]
async fn insert_replace_and_unshift_allocate_fresh_identities() {
	let form = Form::new(FormConfig::new());
	let array = FieldArray::new(&form, "rows", vec![SlotSeed::new()]);
	let original = array.slots()[0].id;

	array.unshift(SlotSeed::new().with_initial_value(json!("front")));
	array.insert(1, SlotSeed::new().with_initial_value(json!("middle")));
	array.replace(2, SlotSeed::new().with_initial_value(json!("swapped in")));

	let slots = array.slots();
	assert_eq!(slots.len(), 3);
	assert_eq!(slots[0].seed.initial_value, Some(json!("front")));
	assert_eq!(slots[1].seed.initial_value, Some(json!("middle")));
	assert_eq!(slots[2].seed.initial_value, Some(json!("swapped in")));
	// The replaced slot did not keep the outgoing identity.
	assert!(slots.iter().all(|slot| slot.id != original));
}

#[tokio::test(start_paused = true)]
async fn dirty_tracks_structural_changes_and_reset() {
	let form = Form::new(FormConfig::new());
	let array = FieldArray::new(
		&form,
		"rows",
		vec![SlotSeed::new(), SlotSeed::new()],
	);
	assert!(!array.is_dirty());

	array.swap(0, 1);
	assert!(array.is_dirty());
	array.swap(0, 1);
	assert!(!array.is_dirty());

	array.push(SlotSeed::new());
	assert!(array.is_dirty());

	array.reset(None);
	assert!(!array.is_dirty());
	assert_eq!(array.slots().len(), 2);

	array.reset(Some(vec![SlotSeed::new()]));
	assert!(!array.is_dirty());
	assert_eq!(array.slots().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn slot_validators_flow_into_mounted_fields() {
	let form = Form::new(FormConfig::new());
	let array = FieldArray::new(
		&form,
		"rows",
		vec![SlotSeed::new().with_validate(|value, _form| {
			if formwork_paths::is_truthy(value) {
				formwork_core::Validation::ok()
			} else {
				formwork_core::Validation::error("empty row")
			}
		})],
	);
	let fields = mount_slots(&form, &array).await;

	fields[0].on_blur().await;
	assert_eq!(form.errors(), json!({"rows": ["empty row"]}));
}
