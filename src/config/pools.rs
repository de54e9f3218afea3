//! Resource pool declarations

use crate::resource::PoolSpace;
use serde::{Deserialize, Serialize};

/// One pool declared at start-up.
///
/// The pool kind and its bounds are flattened into the entry:
///
/// ```toml
/// [[pools]]
/// name = "ip-pool"
/// scope = "global"
/// kind = "subnet"
/// address_space = "10.0.0.0/18"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolConfig {
    pub name: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tag: String,
    #[serde(flatten)]
    pub space: PoolSpace,
}

fn default_scope() -> String {
    "global".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        pools: Vec<PoolConfig>,
    }

    #[test]
    fn test_pool_config_subnet() {
        let toml = r#"
        [[pools]]
        name = "ip-pool"
        kind = "subnet"
        address_space = "10.0.0.0/18"
        "#;
        let wrapper: Wrapper = toml::from_str(toml).unwrap();
        let pool = &wrapper.pools[0];
        assert_eq!(pool.scope, "global");
        assert_eq!(
            pool.space,
            PoolSpace::Subnet {
                address_space: "10.0.0.0/18".parse().unwrap()
            }
        );
    }

    #[test]
    fn test_pool_config_id_range() {
        let toml = r#"
        [[pools]]
        name = "vlan"
        scope = "dc1"
        kind = "id"
        start = 100
        end = 4094
        "#;
        let wrapper: Wrapper = toml::from_str(toml).unwrap();
        assert_eq!(wrapper.pools[0].space, PoolSpace::Id { start: 100, end: 4094 });
    }

    #[test]
    fn test_pool_config_unknown_kind_rejected() {
        let toml = r#"
        [[pools]]
        name = "x"
        kind = "mac"
        "#;
        assert!(toml::from_str::<Wrapper>(toml).is_err());
    }
}
