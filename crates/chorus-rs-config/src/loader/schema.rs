//! Schema validation helpers for Chorus JSON5 configuration.

use crate::ConfigError;
use serde_json::{Map, Value};

/// Validate a single config layer against the schema.
pub(super) fn validate_layer_schema(value: &Value, layer: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    let allowed = [
        "$schema",
        "storage",
        "llm",
        "streaming",
        "context",
        "time",
        "chat",
        "memory",
        "supervisor",
    ];
    ensure_allowed_keys(map, &allowed, layer, "")?;

    if let Some(value) = map.get("$schema") {
        expect_string(value, layer, "$schema")?;
    }
    if let Some(value) = map.get("storage") {
        validate_storage(value, layer, "storage")?;
    }
    if let Some(value) = map.get("llm") {
        validate_llm(value, layer, "llm")?;
    }
    if let Some(value) = map.get("streaming") {
        validate_u64_section(
            value,
            &[
                "first_content_poll_ms",
                "edit_interval_ms",
                "generation_timeout_secs",
            ],
            layer,
            "streaming",
        )?;
    }
    if let Some(value) = map.get("context") {
        validate_context(value, layer, "context")?;
    }
    if let Some(value) = map.get("time") {
        validate_string_section(value, &["timezone", "label", "format"], layer, "time")?;
    }
    if let Some(value) = map.get("chat") {
        validate_chat(value, layer, "chat")?;
    }
    if let Some(value) = map.get("memory") {
        let memory = expect_object(value, layer, "memory")?;
        ensure_allowed_keys(memory, &["recover_corrupt"], layer, "memory")?;
        if let Some(value) = memory.get("recover_corrupt") {
            expect_bool(value, layer, "memory.recover_corrupt")?;
        }
    }
    if let Some(value) = map.get("supervisor") {
        validate_u64_section(
            value,
            &[
                "check_interval_secs",
                "launch_stagger_secs",
                "restart_backoff_secs",
                "max_backoff_secs",
            ],
            layer,
            "supervisor",
        )?;
    }

    Ok(())
}

/// Validate the "storage" block.
fn validate_storage(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &["root", "memory_dir", "config_dir", "log_dir"],
        layer,
        path,
    )?;
    for (key, value) in map {
        let field = join_path(path, key);
        if key == "root" && value.is_null() {
            continue;
        }
        expect_string(value, layer, &field)?;
    }
    Ok(())
}

/// Validate the "llm" block.
fn validate_llm(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "base_url",
            "api_key_env",
            "smart",
            "fast",
            "request_timeout_secs",
        ],
        layer,
        path,
    )?;
    for key in ["base_url", "api_key_env"] {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, &join_path(path, key))?;
        }
    }
    for key in ["smart", "fast"] {
        if let Some(value) = map.get(key) {
            validate_model(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("request_timeout_secs") {
        expect_u64(value, layer, &join_path(path, "request_timeout_secs"))?;
    }
    Ok(())
}

/// Validate a model entry.
fn validate_model(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["name", "temperature"], layer, path)?;
    if let Some(value) = map.get("name") {
        expect_string(value, layer, &join_path(path, "name"))?;
    }
    if let Some(value) = map.get("temperature") {
        expect_f64(value, layer, &join_path(path, "temperature"))?;
    }
    Ok(())
}

/// Validate the "context" block.
fn validate_context(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["window"], layer, path)?;
    let Some(window) = map.get("window") else {
        return Ok(());
    };
    let window_path = join_path(path, "window");
    match window {
        Value::String(mode) if mode == "full" => Ok(()),
        Value::Object(inner) => {
            ensure_allowed_keys(inner, &["recent"], layer, &window_path)?;
            match inner.get("recent") {
                Some(count) => expect_u64(count, layer, &join_path(&window_path, "recent")),
                None => Err(invalid_field(layer, &window_path, "expected recent count")),
            }
        }
        _ => Err(invalid_field(
            layer,
            &window_path,
            "expected \"full\" or { recent: n }",
        )),
    }
}

/// Validate the "chat" block.
fn validate_chat(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "venue_hint",
            "admins",
            "reset_phrase",
            "failure_notice",
            "summary_prompt",
            "join_greeting",
        ],
        layer,
        path,
    )?;
    for (key, value) in map {
        if key == "admins" {
            continue;
        }
        expect_string(value, layer, &join_path(path, key))?;
    }
    if let Some(admins) = map.get("admins") {
        let arr = expect_array(admins, layer, &join_path(path, "admins"))?;
        for (idx, entry) in arr.iter().enumerate() {
            let entry_path = format!("{path}.admins[{idx}]");
            let admin = expect_object(entry, layer, &entry_path)?;
            ensure_allowed_keys(admin, &["handle", "alias"], layer, &entry_path)?;
            match admin.get("handle") {
                Some(handle) => expect_string(handle, layer, &join_path(&entry_path, "handle"))?,
                None => return Err(invalid_field(layer, &entry_path, "missing handle")),
            }
            if let Some(alias) = admin.get("alias").filter(|alias| !alias.is_null()) {
                expect_string(alias, layer, &join_path(&entry_path, "alias"))?;
            }
        }
    }
    Ok(())
}

fn validate_u64_section(
    value: &Value,
    keys: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, keys, layer, path)?;
    for (key, value) in map {
        expect_u64(value, layer, &join_path(path, key))?;
    }
    Ok(())
}

fn validate_string_section(
    value: &Value,
    keys: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, keys, layer, path)?;
    for (key, value) in map {
        expect_string(value, layer, &join_path(path, key))?;
    }
    Ok(())
}

/// Expect a JSON object or return a typed error.
fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(invalid_field(layer, path, "expected object")),
    }
}

fn expect_array<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Vec<Value>, ConfigError> {
    match value {
        Value::Array(arr) => Ok(arr),
        _ => Err(invalid_field(layer, path, "expected array")),
    }
}

fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.as_str().is_some() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

fn expect_bool(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if matches!(value, Value::Bool(_)) {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected bool"))
    }
}

fn expect_u64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_u64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected non-negative integer"))
    }
}

fn expect_f64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_number() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected number"))
    }
}

/// Reject keys outside the allowed set.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    for key in map.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(invalid_field(layer, &join_path(path, key), "unknown key"));
        }
    }
    Ok(())
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Build a structured invalid-field error.
fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let normalized_path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}:{normalized_path}"),
        message: message.to_string(),
    }
}
