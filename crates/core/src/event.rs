//! Storage notification decoding and the run/ignore decision.
//!
//! Notifications arrive either as a bare object resource
//! (`{"bucket": ..., "name": ...}`) or wrapped in a CloudEvents envelope
//! (`{"data": {"bucket": ..., "name": ...}}`). Object names may be
//! percent-escaped once.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// CloudEvents type emitted when an object write completes.
pub const FINALIZED_EVENT_TYPE: &str = "google.cloud.storage.object.v1.finalized";
const FINALIZED_ALIAS: &str = "finalized";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContractError {
    #[error("malformed event payload: {0}")]
    Malformed(String),

    #[error("event payload has no object {0}")]
    MissingField(&'static str),
}

/// Whether a notification should start a run, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventDecision {
    pub should_run: bool,
    pub reason: String,
    pub event_type: String,
}

/// The object a notification refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectDescriptor {
    pub bucket: String,
    pub name: String,
    /// Unescaped `name`; empty when unescaping changed nothing or failed.
    pub name_unescaped: String,
}

impl ObjectDescriptor {
    pub fn canonical_name(&self) -> &str {
        if self.name_unescaped.is_empty() {
            &self.name
        } else {
            &self.name_unescaped
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ObjectResource {
    #[serde(default)]
    bucket: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<ObjectResource>,
}

/// Decodes a notification body and decides whether it should trigger a run
/// for `trusted_bucket`.
pub fn parse_and_decide(
    ce_type: &str,
    body: &[u8],
    trusted_bucket: &str,
) -> Result<(EventDecision, ObjectDescriptor), ContractError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| ContractError::Malformed(e.to_string()))?;

    let resource = pick_resource(value)?;
    let bucket = required(resource.bucket, "bucket")?;
    let name = required(resource.name, "name")?;

    let object = ObjectDescriptor {
        bucket: unescape(&bucket).unwrap_or(bucket),
        name_unescaped: unescape(&name).unwrap_or_default(),
        name,
    };

    let ce_type = ce_type.trim();
    let event_type = if ce_type.is_empty() {
        FINALIZED_EVENT_TYPE.to_string()
    } else {
        ce_type.to_string()
    };

    let decision = if !is_finalized(ce_type) {
        EventDecision {
            should_run: false,
            reason: format!("event type {ce_type} is not an object finalize"),
            event_type,
        }
    } else if object.bucket != trusted_bucket {
        EventDecision {
            should_run: false,
            reason: format!("bucket {} is not the input bucket", object.bucket),
            event_type,
        }
    } else {
        EventDecision {
            should_run: true,
            reason: "object finalized in input bucket".to_string(),
            event_type,
        }
    };

    Ok((decision, object))
}

fn is_finalized(ce_type: &str) -> bool {
    ce_type.is_empty() || ce_type == FINALIZED_EVENT_TYPE || ce_type == FINALIZED_ALIAS
}

fn pick_resource(value: serde_json::Value) -> Result<ObjectResource, ContractError> {
    if !value.is_object() {
        return Err(ContractError::Malformed("expected a JSON object".to_string()));
    }

    let direct: ObjectResource = serde_json::from_value(value.clone()).unwrap_or_default();
    if has_fields(&direct) {
        return Ok(direct);
    }

    match serde_json::from_value::<Envelope>(value) {
        Ok(Envelope { data: Some(inner) }) if has_fields(&inner) => Ok(inner),
        // Report against whichever shape carried something.
        Ok(Envelope { data: Some(inner) }) if !has_any(&direct) => Ok(inner),
        _ => Ok(direct),
    }
}

fn has_fields(resource: &ObjectResource) -> bool {
    non_blank(&resource.bucket) && non_blank(&resource.name)
}

fn has_any(resource: &ObjectResource) -> bool {
    non_blank(&resource.bucket) || non_blank(&resource.name)
}

fn non_blank(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ContractError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ContractError::MissingField(field))
}

/// Percent-decodes once; `None` when decoding fails or is a no-op.
fn unescape(value: &str) -> Option<String> {
    match urlencoding::decode(value) {
        Ok(decoded) if decoded != value => Some(decoded.into_owned()),
        _ => None,
    }
}
