//! Pools command implementation

use crate::cli::output::{format_pools_json, format_pools_table, PoolView};
use crate::cli::PoolsArgs;
use crate::config::NetweaveConfig;
use crate::resource::{AdminSnapshot, ResourceAdmin};

/// Handle `netweave pools` command
///
/// Declares the configured pools on top of an optional snapshot, then
/// reports usage for every pool.
pub fn handle_pools(args: &PoolsArgs) -> Result<String, Box<dyn std::error::Error>> {
    let config = NetweaveConfig::load(Some(&args.config))?;
    config.validate()?;

    let admin = match &args.state {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            let snapshot: AdminSnapshot = serde_json::from_str(&content)?;
            ResourceAdmin::restore(snapshot)?
        }
        None => ResourceAdmin::new(),
    };
    admin.declare_pools(&config.pools)?;

    let views: Vec<PoolView> = admin.list_pools().iter().map(PoolView::from).collect();

    if args.json {
        Ok(format_pools_json(&views)?)
    } else {
        Ok(format_pools_table(&views))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::SizeSpec;
    use std::path::Path;

    const CONFIG: &str = r#"
[[pools]]
name = "ip-pool"
kind = "subnet"
address_space = "10.0.0.0/24"

[[pools]]
name = "svc-id"
kind = "id"
start = 1
end = 10
"#;

    fn write_config(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("netweave.toml");
        std::fs::write(&path, CONFIG).unwrap();
        path
    }

    #[test]
    fn test_pools_json_lists_declared_pools() {
        let dir = tempfile::tempdir().unwrap();
        let args = PoolsArgs {
            config: write_config(dir.path()),
            state: None,
            json: true,
        };

        let output = handle_pools(&args).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        let pools = parsed["pools"].as_array().unwrap();
        assert_eq!(pools.len(), 2);
        assert!(pools.iter().all(|p| p["allocations"] == 0));
    }

    #[test]
    fn test_pools_restores_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_config(dir.path());

        let admin = ResourceAdmin::new();
        let config = NetweaveConfig::load(Some(&config_path)).unwrap();
        admin.declare_pools(&config.pools).unwrap();
        admin
            .obtain("svc-id", "global", SizeSpec::Single, "l2-service", "acme#web")
            .unwrap();
        let state_path = dir.path().join("pools.json");
        std::fs::write(&state_path, serde_json::to_string(&admin.snapshot()).unwrap()).unwrap();

        let args = PoolsArgs {
            config: config_path,
            state: Some(state_path),
            json: true,
        };
        let output = handle_pools(&args).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        let svc = parsed["pools"]
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["name"] == "svc-id")
            .unwrap()
            .clone();
        assert_eq!(svc["allocations"], 1);
    }

    #[test]
    fn test_pools_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let args = PoolsArgs {
            config: dir.path().join("absent.toml"),
            state: None,
            json: false,
        };
        assert!(handle_pools(&args).is_err());
    }
}
