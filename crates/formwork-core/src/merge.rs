//! Error merging
//!
//! Combines several error sources into one flat path→error map. For each
//! path, the first source in the sequence that supplies a truthy value
//! wins; later sources are ignored for that path. The caller orders the
//! sequence field-errors-before-form-errors, which is what gives
//! field-level validators precedence over the form-level validator.

use serde_json::Value;
use std::collections::BTreeMap;

/// Merges an ordered sequence of error trees (nested or already flat) into
/// a flat path→error map. Falsy leaves never populate the result.
///
/// # Examples
///
/// ```
/// use formwork_core::merge::merge_error_sources;
/// use serde_json::json;
///
/// let merged = merge_error_sources([
///     json!({"a": "field error"}),
///     json!({"a": "form error", "b": {"c": "also kept"}}),
/// ]);
/// assert_eq!(merged.get("a"), Some(&json!("field error")));
/// assert_eq!(merged.get("b.c"), Some(&json!("also kept")));
/// ```
pub fn merge_error_sources<I>(sources: I) -> BTreeMap<String, Value>
where
	I: IntoIterator<Item = Value>,
{
	let mut merged = BTreeMap::new();
	for source in sources {
		for (path, error) in formwork_paths::flatten(&source) {
			if formwork_paths::is_truthy(&error) {
				merged.entry(path).or_insert(error);
			}
		}
	}
	merged
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn first_truthy_source_wins() {
		let merged = merge_error_sources([json!({"a": "first"}), json!({"a": "second"})]);
		assert_eq!(merged.get("a"), Some(&json!("first")));
	}

	#[rstest]
	fn falsy_leaves_are_skipped() {
		let merged = merge_error_sources([
			json!({"a": null, "b": "", "c": 0, "d": false}),
			json!({"a": "late but truthy"}),
		]);
		assert_eq!(merged.len(), 1);
		assert_eq!(merged.get("a"), Some(&json!("late but truthy")));
	}

	#[rstest]
	fn nested_sources_flatten_to_paths() {
		let merged = merge_error_sources([json!({"user": {"name": "required"}})]);
		assert_eq!(merged.get("user.name"), Some(&json!("required")));
	}

	#[rstest]
	fn flat_dotted_keys_pass_through() {
		let merged = merge_error_sources([json!({"user.name": "required"})]);
		assert_eq!(merged.get("user.name"), Some(&json!("required")));
	}

	#[rstest]
	fn empty_sources_merge_to_empty() {
		assert!(merge_error_sources([json!({}), json!(null)]).is_empty());
	}

	proptest::proptest! {
		#[test]
		fn earlier_truthy_values_always_win(
			path in "[a-z]{1,6}",
			first in "[a-z0-9]{0,8}",
			second in "[a-z0-9]{1,8}",
		) {
			let merged = merge_error_sources([
				json!({path.clone(): first.clone()}),
				json!({path.clone(): second.clone()}),
			]);
			let expected = if first.is_empty() { &second } else { &first };
			proptest::prop_assert_eq!(merged.get(&path), Some(&json!(expected)));
		}
	}
}
