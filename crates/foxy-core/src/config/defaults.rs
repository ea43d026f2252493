use serde_json::{Map, Value, json};

/// Built-in values for every foxy setting.
pub fn default_config() -> Map<String, Value> {
    let defaults = json!({
        "enabled": true,
        "manager": null,
        "manager-version": {
            "npm": ">=5.0.0",
            "yarn": ">=1.0.0",
            "pnpm": ">=7.0.0"
        },
        "manager-bin": null,
        "manager-options": null,
        "manager-install-options": null,
        "manager-update-options": null,
        "manager-timeout": null,
        "composer-asset-dir": null,
        "run-asset-manager": true,
        "fallback-asset": true,
        "fallback-composer": true,
        "enable-packages": {}
    });

    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
