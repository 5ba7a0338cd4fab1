use super::manifest::{
    ModuleManifest, Rejection, SkipReason, REQUIRED_FIELDS, SUPPORTED_MANIFEST_VERSION,
};
use serde_json::Value;

/// Decides whether `raw` is a usable manifest for the module directory `candidate_id`.
///
/// Checks run in a fixed order and stop at the first failure: JSON syntax,
/// presence of every required key, `id` equality, `manifestVersion` support and
/// finally field types. Comparisons are exact. No I/O is performed.
pub fn validate(candidate_id: &str, raw: &str) -> Result<ModuleManifest, Rejection> {
    let document: Value = serde_json::from_str(raw)
        .map_err(|err| Rejection::new(SkipReason::InvalidJson, err.to_string()))?;

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| document.get(field).map_or(true, Value::is_null))
        .collect();
    if !missing.is_empty() {
        return Err(Rejection::new(
            SkipReason::MissingFields,
            format!("missing {}", missing.join(", ")),
        ));
    }

    match &document["id"] {
        Value::String(id) if id == candidate_id => {}
        other => {
            return Err(Rejection::new(
                SkipReason::IdMismatch,
                format!("manifest id {other} does not match directory '{candidate_id}'"),
            ));
        }
    }

    match &document["manifestVersion"] {
        Value::String(version) if version == SUPPORTED_MANIFEST_VERSION => {}
        other => {
            return Err(Rejection::new(
                SkipReason::UnsupportedVersion,
                format!("manifestVersion {other} is not supported"),
            ));
        }
    }

    serde_json::from_value(document)
        .map_err(|err| Rejection::new(SkipReason::InvalidFieldType, err.to_string()))
}
