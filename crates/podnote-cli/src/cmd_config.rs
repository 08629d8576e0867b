use podnote_store::{StoreConfig, StorePaths, CONFIG_KEYS};
use std::path::Path;

/// Read config from `config.json`. Returns empty map if file doesn't exist.
fn read_config(path: &Path) -> anyhow::Result<serde_json::Map<String, serde_json::Value>> {
    if !path.exists() {
        return Ok(serde_json::Map::new());
    }
    let content = std::fs::read_to_string(path)?;
    let val: serde_json::Value = serde_json::from_str(&content)?;
    match val {
        serde_json::Value::Object(map) => Ok(map),
        _ => Ok(serde_json::Map::new()),
    }
}

/// Write config to `config.json`.
fn write_config(
    path: &Path,
    config: &serde_json::Map<String, serde_json::Value>,
) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&config)?;
    podnote_store::write_atomic(path, json.as_bytes())?;
    Ok(())
}

/// Parse a string value into a JSON number, falling back to a string.
fn parse_value(s: &str) -> serde_json::Value {
    if let Ok(n) = s.parse::<u64>() {
        serde_json::Value::Number(n.into())
    } else if let Ok(f) = s.parse::<f64>() {
        serde_json::json!(f)
    } else {
        serde_json::Value::String(s.to_string())
    }
}

fn check_key(key: &str) -> anyhow::Result<()> {
    if !CONFIG_KEYS.contains(&key) {
        anyhow::bail!(
            "unknown config key: {key}. Expected one of: {}",
            CONFIG_KEYS.join(", ")
        );
    }
    Ok(())
}

/// `podnote config set <key> <value>`
///
/// The merged file must still form a valid [`StoreConfig`].
pub fn set(paths: &StorePaths, key: &str, value: &str) -> anyhow::Result<()> {
    check_key(key)?;
    let mut config = read_config(&paths.config_json)?;
    config.insert(key.to_string(), parse_value(value));
    let merged: StoreConfig = serde_json::from_value(serde_json::Value::Object(config.clone()))
        .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}"))?;
    merged.validate()?;
    write_config(&paths.config_json, &config)?;
    println!("{key} = {value}");
    Ok(())
}

/// `podnote config get <key>`
pub fn get(paths: &StorePaths, key: &str) -> anyhow::Result<()> {
    check_key(key)?;
    let config = read_config(&paths.config_json)?;
    match config.get(key) {
        Some(val) => println!("{val}"),
        None => {
            let defaults = serde_json::to_value(StoreConfig::default())?;
            println!("{} (default)", defaults[key]);
        }
    }
    Ok(())
}

/// `podnote config list`
pub fn list(paths: &StorePaths) -> anyhow::Result<()> {
    let config = read_config(&paths.config_json)?;
    let defaults = serde_json::to_value(StoreConfig::default())?;
    for key in CONFIG_KEYS {
        match config.get(key) {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} = {} (default)", defaults[key]),
        }
    }
    Ok(())
}
