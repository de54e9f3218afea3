//! Device-family to rendering-template dispatch.
//!
//! Elements describe their platform with a colon-delimited
//! `<family>:<type>:<release>` descriptor, e.g. `7750 SR:7750 SR-1:24.10.R1`.
//! The dispatcher maps the family (and optionally the type) to a template
//! identifier through an ordered rule table with a default fallback.

use crate::config::{TemplateConfig, TemplateRule};

/// The segments of a `<family>:<type>:<release>` descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor<'a> {
    pub family: &'a str,
    pub device_type: Option<&'a str>,
    pub release: Option<&'a str>,
}

impl<'a> Descriptor<'a> {
    /// Split a descriptor. Missing or blank segments become `None`; the
    /// family is always present, possibly empty.
    pub fn parse(descriptor: &'a str) -> Self {
        let mut parts = descriptor.splitn(3, ':').map(str::trim);
        let family = parts.next().unwrap_or_default();
        let device_type = parts.next().filter(|s| !s.is_empty());
        let release = parts.next().filter(|s| !s.is_empty());
        Self {
            family,
            device_type,
            release,
        }
    }
}

/// Outcome of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateMatch<'a> {
    pub template: &'a str,
    /// No rule matched and the default was used
    pub fallback: bool,
}

/// Ordered rule table plus default template.
#[derive(Debug, Clone)]
pub struct TemplateDispatcher {
    rules: Vec<TemplateRule>,
    default: String,
}

impl Default for TemplateDispatcher {
    fn default() -> Self {
        Self::from_config(&TemplateConfig::default())
    }
}

impl TemplateDispatcher {
    pub fn new(rules: Vec<TemplateRule>, default: impl Into<String>) -> Self {
        Self {
            rules,
            default: default.into(),
        }
    }

    pub fn from_config(config: &TemplateConfig) -> Self {
        Self::new(config.rules.clone(), config.default.clone())
    }

    pub fn default_template(&self) -> &str {
        &self.default
    }

    /// Resolve a descriptor against the rule table.
    pub fn resolve(&self, family_type_release: &str) -> TemplateMatch<'_> {
        let descriptor = Descriptor::parse(family_type_release);

        let matched = self.rules.iter().find(|rule| {
            rule.family == descriptor.family
                && rule
                    .device_type
                    .as_deref()
                    .map_or(true, |t| Some(t) == descriptor.device_type)
        });

        match matched {
            Some(rule) => TemplateMatch {
                template: &rule.template,
                fallback: false,
            },
            None => TemplateMatch {
                template: &self.default,
                fallback: true,
            },
        }
    }

    /// Template identifier for an element. Never fails: unknown families get
    /// the default template.
    pub fn get_template_name(&self, element_id: &str, family_type_release: &str) -> &str {
        let resolved = self.resolve(family_type_release);
        if resolved.fallback {
            tracing::debug!(
                element_id,
                family_type_release,
                template = resolved.template,
                "No template rule matched, using default"
            );
        } else {
            tracing::trace!(element_id, template = resolved.template, "Template selected");
        }
        resolved.template
    }

    /// Whether a rule (not the fallback) covers this descriptor.
    pub fn is_supported(&self, family_type_release: &str) -> bool {
        !self.resolve(family_type_release).fallback
    }
}
