//! Dot-path access over `serde_json::Value` trees
//!
//! Paths are strings of segments joined by `.` (for example `"a.b.0.c"`).
//! Numeric segments address array elements; all other segments address
//! object keys. No path syntax validation is performed: a malformed path
//! simply reads as absent and writes the literal key.
//!
//! `set` and `unset` are copy-on-write — they return a new tree and never
//! mutate their input.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Returns the value at `path`, or `None` if any segment is absent.
///
/// # Examples
///
/// ```
/// use serde_json::json;
///
/// let tree = json!({"a": {"b": [json!({"c": 1})]}});
/// assert_eq!(formwork_paths::get(&tree, "a.b.0.c"), Some(&json!(1)));
/// assert_eq!(formwork_paths::get(&tree, "a.x"), None);
/// ```
pub fn get<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
	let mut node = tree;
	for segment in path.split('.') {
		node = match node {
			Value::Object(map) => map.get(segment)?,
			Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
			_ => return None,
		};
	}
	Some(node)
}

/// Returns a new tree with `value` written at `path`.
///
/// Intermediate nodes are created as needed: arrays when the next segment
/// is numeric, objects otherwise. Existing containers are reused as-is, so
/// a numeric segment against an existing object addresses the literal key.
///
/// # Examples
///
/// ```
/// use serde_json::json;
///
/// let tree = formwork_paths::set(&json!({}), "a.b", json!(5));
/// assert_eq!(tree, json!({"a": {"b": 5}}));
///
/// let tree = formwork_paths::set(&json!({}), "list.1", json!("x"));
/// assert_eq!(tree, json!({"list": [null, "x"]}));
/// ```
pub fn set(tree: &Value, path: &str, value: Value) -> Value {
	let mut root = tree.clone();
	let segments: Vec<&str> = path.split('.').collect();
	set_mut(&mut root, &segments, value);
	root
}

fn set_mut(node: &mut Value, segments: &[&str], value: Value) {
	let segment = segments[0];
	if !node.is_object() && !node.is_array() {
		*node = if segment.parse::<usize>().is_ok() {
			Value::Array(Vec::new())
		} else {
			Value::Object(Map::new())
		};
	}
	match node {
		Value::Array(items) => match segment.parse::<usize>() {
			Ok(index) => {
				if items.len() <= index {
					items.resize(index + 1, Value::Null);
				}
				if segments.len() == 1 {
					items[index] = value;
				} else {
					set_mut(&mut items[index], &segments[1..], value);
				}
			}
			Err(_) => {
				// Non-numeric segment against an array: re-key the
				// elements by index so the literal key can be written.
				let map: Map<String, Value> = items
					.iter()
					.enumerate()
					.map(|(index, item)| (index.to_string(), item.clone()))
					.collect();
				*node = Value::Object(map);
				set_mut(node, segments, value);
			}
		},
		Value::Object(map) => {
			if segments.len() == 1 {
				map.insert(segment.to_string(), value);
			} else {
				let child = map.entry(segment.to_string()).or_insert(Value::Null);
				set_mut(child, &segments[1..], value);
			}
		}
		_ => unreachable!("node was materialized as a container"),
	}
}

/// Returns a new tree with the value at `path` removed.
///
/// Object keys are deleted; array elements are nulled out so sibling
/// indices keep their positions. Emptied intermediate containers are left
/// in place.
///
/// # Examples
///
/// ```
/// use serde_json::json;
///
/// let tree = formwork_paths::set(&json!({}), "x.y", json!(5));
/// let removed = formwork_paths::unset(&tree, "x.y");
/// assert_eq!(formwork_paths::get(&removed, "x.y"), None);
/// assert_eq!(removed, json!({"x": {}}));
/// ```
pub fn unset(tree: &Value, path: &str) -> Value {
	let mut root = tree.clone();
	let segments: Vec<&str> = path.split('.').collect();
	unset_mut(&mut root, &segments);
	root
}

fn unset_mut(node: &mut Value, segments: &[&str]) {
	let segment = segments[0];
	if segments.len() == 1 {
		match node {
			Value::Object(map) => {
				map.remove(segment);
			}
			Value::Array(items) => {
				if let Ok(index) = segment.parse::<usize>() {
					if index < items.len() {
						items[index] = Value::Null;
					}
				}
			}
			_ => {}
		}
		return;
	}
	let child = match node {
		Value::Object(map) => map.get_mut(segment),
		Value::Array(items) => segment
			.parse::<usize>()
			.ok()
			.and_then(|index| items.get_mut(index)),
		_ => None,
	};
	if let Some(child) = child {
		unset_mut(child, &segments[1..]);
	}
}

/// Flattens a nested tree into a map from joined dot-path to leaf value.
///
/// Empty objects and arrays are treated as leaves and kept at their path.
/// A non-container input flattens to an empty map.
///
/// # Examples
///
/// ```
/// use serde_json::json;
///
/// let flat = formwork_paths::flatten(&json!({"a": {"b": 1}, "c": [2]}));
/// assert_eq!(flat.get("a.b"), Some(&json!(1)));
/// assert_eq!(flat.get("c.0"), Some(&json!(2)));
/// ```
pub fn flatten(tree: &Value) -> BTreeMap<String, Value> {
	let mut out = BTreeMap::new();
	flatten_step(tree, None, &mut out);
	out
}

fn flatten_step(node: &Value, prefix: Option<&str>, out: &mut BTreeMap<String, Value>) {
	let entries: Vec<(String, &Value)> = match node {
		Value::Object(map) => map.iter().map(|(key, value)| (key.clone(), value)).collect(),
		Value::Array(items) => items
			.iter()
			.enumerate()
			.map(|(index, value)| (index.to_string(), value))
			.collect(),
		_ => return,
	};
	for (key, value) in entries {
		let path = match prefix {
			Some(prefix) => format!("{prefix}.{key}"),
			None => key,
		};
		let descend = match value {
			Value::Object(map) => !map.is_empty(),
			Value::Array(items) => !items.is_empty(),
			_ => false,
		};
		if descend {
			flatten_step(value, Some(&path), out);
		} else {
			out.insert(path, value.clone());
		}
	}
}

/// Rebuilds a nested tree from a flat path→value map. Inverse of
/// [`flatten`] up to array-hole nulls.
pub fn unflatten(flat: &BTreeMap<String, Value>) -> Value {
	flat.iter().fold(
		Value::Object(Map::new()),
		|tree, (path, value)| set(&tree, path, value.clone()),
	)
}

/// JavaScript-style truthiness: `null`, `false`, `0`, `NaN` and `""` are
/// falsy, everything else (including empty containers) is truthy.
pub fn is_truthy(value: &Value) -> bool {
	match value {
		Value::Null => false,
		Value::Bool(flag) => *flag,
		Value::Number(number) => number.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
		Value::String(text) => !text.is_empty(),
		Value::Array(_) | Value::Object(_) => true,
	}
}
