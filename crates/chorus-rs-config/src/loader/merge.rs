//! Merging config layers as JSON values.

use serde_json::Value;

/// Lay `overlay` over `base`. Objects merge per key, recursively; any
/// other value (arrays included) replaces what was there.
pub(super) fn merge_json_values(base: &mut Value, overlay: &Value) {
    if let (Value::Object(target), Value::Object(layer)) = (&mut *base, overlay) {
        for (key, value) in layer {
            if let Some(slot) = target.get_mut(key) {
                merge_json_values(slot, value);
            } else {
                target.insert(key.clone(), value.clone());
            }
        }
        return;
    }
    *base = overlay.clone();
}

#[cfg(test)]
mod tests {
    use super::merge_json_values;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn nested_objects_merge_and_arrays_replace() {
        let mut base = json!({
            "llm": { "smart": { "name": "gpt-4", "temperature": 0.65 } },
            "chat": { "admins": [{ "handle": "a" }] }
        });
        merge_json_values(
            &mut base,
            &json!({
                "llm": { "smart": { "name": "gpt-4o" } },
                "chat": { "admins": [{ "handle": "b" }] }
            }),
        );
        assert_eq!(
            base,
            json!({
                "llm": { "smart": { "name": "gpt-4o", "temperature": 0.65 } },
                "chat": { "admins": [{ "handle": "b" }] }
            })
        );
    }
}
