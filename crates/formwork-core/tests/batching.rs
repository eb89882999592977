//! Batched transitions observed through the form controller

use formwork_core::{Field, FieldOptions, Form, FormConfig};
use serde_json::{Value, json};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn concurrent_mutations_apply_in_call_order() {
	let form = Form::new(FormConfig::new());
	let _a = Field::mount(&form, FieldOptions::new("a")).await;
	let _b = Field::mount(&form, FieldOptions::new("b")).await;

	// All issued within one quiescence window; the final tree must equal
	// sequential application in call order.
	tokio::join!(
		async {
			form.set_field_value("a", json!(1), Some(false)).await.unwrap();
		},
		async {
			form.set_field_value("b", json!(2), Some(false)).await.unwrap();
		},
		async {
			form.set_field_value("a", json!(3), Some(false)).await.unwrap();
		}
	);

	assert_eq!(form.values(), json!({"a": 3, "b": 2}));
}

#[tokio::test(start_paused = true)]
async fn read_your_writes_after_awaiting() {
	let form = Form::new(FormConfig::new());
	let _a = Field::mount(&form, FieldOptions::new("a")).await;

	form.set_field_value("a", json!("visible"), Some(false))
		.await
		.unwrap();
	// The promise resolved, so the write is committed — no extra waiting.
	assert_eq!(form.values(), json!({"a": "visible"}));
}

#[tokio::test(start_paused = true)]
async fn transitions_in_one_batch_compose_left_to_right() {
	let form = Form::new(FormConfig::new());

	let first = form.set_form_state(|mut state| {
		state.meta = Some(json!([1]));
		state
	});
	let second = form.set_form_state(|mut state| {
		let mut items = state
			.meta
			.take()
			.and_then(|meta| meta.as_array().cloned())
			.unwrap_or_default();
		items.push(json!(2));
		state.meta = Some(Value::Array(items));
		state
	});
	tokio::join!(first, second);

	assert_eq!(form.meta(), Some(json!([1, 2])));
}

#[tokio::test(start_paused = true)]
async fn quiescence_window_extends_on_new_enqueues() {
	let form = Form::new(FormConfig::new());

	let first = form.set_form_state(|mut state| {
		state.submit_count = 1;
		state
	});
	tokio::time::advance(Duration::from_millis(15)).await;
	let second = form.set_form_state(|mut state| {
		state.submit_count += 1;
		state
	});

	// 25ms in: the first timer was superseded, nothing committed yet.
	tokio::time::advance(Duration::from_millis(10)).await;
	tokio::task::yield_now().await;
	assert_eq!(form.submit_count(), 0);

	tokio::join!(first, second);
	assert_eq!(form.submit_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn dropped_mutation_futures_still_commit() {
	let form = Form::new(FormConfig::new());
	drop(form.set_form_state(|mut state| {
		state.meta = Some(json!("kept"));
		state
	}));

	form.set_form_state(|state| state).await;
	assert_eq!(form.meta(), Some(json!("kept")));
}
