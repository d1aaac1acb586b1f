//! Deep, key-wise metadata merging.
//!
//! The merge is a recursive union: keys absent from the update are preserved,
//! and an empty update value never erases an existing non-empty value unless
//! the caller is privileged. Privileged callers may explicitly clear fields;
//! the key is kept and the empty value written.

use serde_json::{Map, Value};

/// Merges `update` into `existing` and returns the merged document.
pub fn merge_metadata(existing: &Value, update: &Value, privileged: bool) -> Value {
	match (existing, update) {
		(Value::Object(existing), Value::Object(update)) =>
			Value::Object(merge_objects(existing, update, privileged)),
		_ =>
			if !privileged && is_empty_value(update) && !is_empty_value(existing) {
				existing.clone()
			} else {
				update.clone()
			},
	}
}

fn merge_objects(
	existing: &Map<String, Value>,
	update: &Map<String, Value>,
	privileged: bool,
) -> Map<String, Value> {
	let mut merged = existing.clone();

	for (key, update_value) in update {
		match existing.get(key) {
			Some(existing_value) => {
				merged.insert(key.clone(), merge_metadata(existing_value, update_value, privileged));
			},
			None => {
				merged.insert(key.clone(), update_value.clone());
			},
		}
	}

	merged
}

/// The per-variant emptiness test the merge rule is defined over. `null`,
/// empty strings, zero numbers, `false`, and empty containers are all empty.
fn is_empty_value(value: &Value) -> bool {
	match value {
		Value::Null => true,
		Value::Bool(flag) => !flag,
		Value::Number(number) => number.as_f64().map(|value| value == 0.0).unwrap_or(false),
		Value::String(text) => text.is_empty(),
		Value::Array(items) => items.is_empty(),
		Value::Object(members) => members.is_empty(),
	}
}
