//! The `config` command: show, set, and locate configuration.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use crate::error::{Result, SkiveError};

pub fn run_config(action: &ConfigAction, settings: Settings) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let rendered = toml::to_string_pretty(&settings)
                .map_err(|e| SkiveError::Config(e.to_string()))?;
            print!("{}", rendered);
            Ok(())
        }

        ConfigAction::Path => {
            println!("{}", Settings::default_config_path().display());
            Ok(())
        }

        ConfigAction::Set { key, value } => {
            let updated = set_key(settings, key, value)?;
            updated.save()?;
            Output::success(&format!("Set {} = {}", key, value));
            Ok(())
        }
    }
}

/// Applies a dotted-key assignment by editing the TOML representation and
/// re-parsing it, so unknown keys and type mismatches are rejected by the
/// same deserializer that loads the file.
fn set_key(settings: Settings, key: &str, value: &str) -> Result<Settings> {
    let rendered =
        toml::to_string_pretty(&settings).map_err(|e| SkiveError::Config(e.to_string()))?;
    let mut root: toml::Value = toml::from_str(&rendered)?;

    let mut node = &mut root;
    let parts: Vec<&str> = key.split('.').collect();
    let (last, path) = parts
        .split_last()
        .ok_or_else(|| SkiveError::InvalidInput("Empty configuration key".into()))?;

    for part in path {
        node = node
            .get_mut(*part)
            .ok_or_else(|| SkiveError::InvalidInput(format!("Unknown configuration key: {}", key)))?;
    }

    let table = node
        .as_table_mut()
        .ok_or_else(|| SkiveError::InvalidInput(format!("Not a configuration table: {}", key)))?;
    if !table.contains_key(*last) && !is_optional_key(key) {
        return Err(SkiveError::InvalidInput(format!(
            "Unknown configuration key: {}",
            key
        )));
    }
    table.insert((*last).to_string(), parse_value(value));

    let updated: Settings = toml::from_str(&toml::to_string(&root).map_err(|e| {
        SkiveError::Config(e.to_string())
    })?)?;
    Ok(updated)
}

/// Optional fields are skipped by the serializer when unset, so they are
/// settable even when absent from the rendered TOML.
fn is_optional_key(key: &str) -> bool {
    matches!(key, "service.language" | "service.api_key")
}

fn parse_value(value: &str) -> toml::Value {
    if let Ok(b) = value.parse::<bool>() {
        return toml::Value::Boolean(b);
    }
    if let Ok(i) = value.parse::<i64>() {
        return toml::Value::Integer(i);
    }
    if let Ok(f) = value.parse::<f64>() {
        return toml::Value::Float(f);
    }
    toml::Value::String(value.to_string())
}
