//! Drift detection between desired and live device state.

use crate::intent::ManagedObject;
use crate::platform::{DeviceAccess, DeviceError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// An expected object absent from the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct MisalignedObject {
    pub element_id: String,
    pub model_path: String,
}

/// An attribute whose live value differs from the desired one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct MisalignedAttribute {
    pub element_id: String,
    pub model_path: String,
    pub attribute: String,
    pub expected: Value,
    /// `None` when the attribute is missing on the device
    pub actual: Option<Value>,
}

/// Result of auditing one intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuditReport {
    pub target: String,
    pub run_id: Uuid,
    pub audited_at: DateTime<Utc>,
    pub misaligned_objects: Vec<MisalignedObject>,
    pub misaligned_attributes: Vec<MisalignedAttribute>,
    /// Elements that could not be queried; their objects were not compared
    pub unreachable: Vec<String>,
}

impl AuditReport {
    pub fn new(target: &str, run_id: Uuid) -> Self {
        Self {
            target: target.to_string(),
            run_id,
            audited_at: Utc::now(),
            misaligned_objects: Vec::new(),
            misaligned_attributes: Vec::new(),
            unreachable: Vec::new(),
        }
    }

    /// No drift and every element was reachable.
    pub fn is_aligned(&self) -> bool {
        self.misaligned_objects.is_empty()
            && self.misaligned_attributes.is_empty()
            && self.unreachable.is_empty()
    }

    pub fn misalignment_count(&self) -> usize {
        self.misaligned_objects.len() + self.misaligned_attributes.len()
    }
}

/// Compare the expected objects of one element with the device.
///
/// A missing object is reported once, without attribute diffs. Any other
/// device error marks the element unreachable and stops comparing it.
pub(crate) async fn audit_site(
    devices: &dyn DeviceAccess,
    element_id: &str,
    expected: &[ManagedObject],
    report: &mut AuditReport,
) {
    for object in expected {
        let live = match devices.query(element_id, &object.model_path).await {
            Ok(live) => live,
            Err(DeviceError::NotFound { .. }) => {
                report.misaligned_objects.push(MisalignedObject {
                    element_id: element_id.to_string(),
                    model_path: object.model_path.clone(),
                });
                continue;
            }
            Err(e) => {
                tracing::warn!(
                    target_name = %report.target,
                    element_id,
                    error = %e,
                    "Element unreachable during audit"
                );
                report.unreachable.push(element_id.to_string());
                return;
            }
        };

        for (attribute, expected) in &object.attributes {
            let actual = live.get(attribute);
            if actual != Some(expected) {
                report.misaligned_attributes.push(MisalignedAttribute {
                    element_id: element_id.to_string(),
                    model_path: object.model_path.clone(),
                    attribute: attribute.clone(),
                    expected: expected.clone(),
                    actual: actual.cloned(),
                });
            }
        }
    }
}
