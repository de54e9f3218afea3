//! Device-family to template mapping

use serde::{Deserialize, Serialize};

/// One ordered dispatch rule.
///
/// Matches the family segment of a `<family>:<type>:<release>` descriptor
/// exactly and, when `device_type` is set, the type segment too.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateRule {
    pub family: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    pub template: String,
}

impl TemplateRule {
    pub fn new(family: &str, template: &str) -> Self {
        Self {
            family: family.to_string(),
            device_type: None,
            template: template.to_string(),
        }
    }
}

/// Template dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Template used when no rule matches
    pub default: String,
    /// Rules evaluated in order; the first match wins
    pub rules: Vec<TemplateRule>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            default: "openconfig".to_string(),
            rules: vec![
                TemplateRule::new("7220 IXR SRLinux", "srlinux"),
                TemplateRule::new("7250 IXR SRLinux", "srlinux"),
                TemplateRule::new("7730 SXR SRLinux", "srlinux"),
                TemplateRule::new("7750 SR", "sros"),
                TemplateRule::new("7450 ESS", "sros"),
                TemplateRule::new("7950 XRS", "sros"),
                TemplateRule::new("7250 IXR", "sros"),
            ],
        }
    }
}
