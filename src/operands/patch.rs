//! JSON patch overrides carried as annotations on the HyperConverged record
//!
//! An admin can tune operand fields the HyperConverged API does not expose
//! by putting an RFC 6902 patch into an annotation. The patch is applied as
//! the last build step and may only touch `/spec/...`.

use json_patch::{patch, Patch, PatchOperation};
use kube::ResourceExt;
use serde::{de::DeserializeOwned, Serialize};

use crate::crd::HyperConverged;
use crate::error::{Error, Result};

/// Annotation holding the patch for the KubeVirt operand
pub const JSON_PATCH_KV_ANNOTATION: &str = "kubevirt.kubevirt.io/jsonpatch";

/// Apply the patch stored under `annotation` on `hc` to `obj`, if present.
///
/// On failure nothing of the patch is kept; the caller gets an error and
/// must discard the object.
pub fn apply_patch_to_spec<T>(hc: &HyperConverged, annotation: &str, obj: T) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    match hc.annotations().get(annotation) {
        Some(raw) => apply_annotation_patch(obj, raw),
        None => Ok(obj),
    }
}

/// Apply a raw JSON patch document to `obj`
pub fn apply_annotation_patch<T>(obj: T, raw: &str) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let operations: Patch = serde_json::from_str(raw)
        .map_err(|e| Error::patch(format!("invalid JSON patch document: {e}")))?;

    for op in &operations.0 {
        let path = operation_path(op);
        if !path.starts_with("/spec/") {
            return Err(Error::patch(format!(
                "can only modify spec fields, got path '{path}'"
            )));
        }
    }

    let mut value = serde_json::to_value(&obj)?;
    patch(&mut value, &operations).map_err(|e| Error::patch(format!("failed to apply: {e}")))?;

    serde_json::from_value(value)
        .map_err(|e| Error::patch(format!("patched object is not valid: {e}")))
}

fn operation_path(op: &PatchOperation) -> &str {
    match op {
        PatchOperation::Add(add) => add.path.as_str(),
        PatchOperation::Remove(remove) => remove.path.as_str(),
        PatchOperation::Replace(replace) => replace.path.as_str(),
        PatchOperation::Move(mv) => mv.path.as_str(),
        PatchOperation::Copy(copy) => copy.path.as_str(),
        PatchOperation::Test(test) => test.path.as_str(),
    }
}
