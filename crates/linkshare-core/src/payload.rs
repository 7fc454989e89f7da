//! Request payload validation
//!
//! Turns caller input into the typed values the core accepts. Update payloads
//! arrive as loosely-typed JSON objects and are decoded into an explicit
//! [`ResourceFieldDiff`]; keys the core does not recognize are dropped.

use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};
use crate::models::{NewCollection, NewResource, Privacy, ResourceFieldDiff};

/// Check that a resource id from the request is usable
pub fn validate_resource_id(id: i64) -> CoreResult<()> {
    if id <= 0 {
        return Err(CoreError::validation("Invalid resource Id in request"));
    }
    Ok(())
}

/// Validate and normalize a resource about to be created
pub fn validate_new_resource(resource: &NewResource) -> CoreResult<NewResource> {
    Ok(NewResource {
        title: non_empty(&resource.title, "Title cannot be empty")?,
        link: valid_link(&resource.link)?,
        kind: non_empty(&resource.kind, "Type cannot be empty")?,
        privacy: resource.privacy,
    })
}

/// Validate and normalize a field diff built by the caller
pub fn validate_field_diff(diff: &ResourceFieldDiff) -> CoreResult<ResourceFieldDiff> {
    Ok(ResourceFieldDiff {
        title: diff
            .title
            .as_deref()
            .map(|t| non_empty(t, "Title cannot be empty"))
            .transpose()?,
        link: diff.link.as_deref().map(valid_link).transpose()?,
        kind: diff
            .kind
            .as_deref()
            .map(|k| non_empty(k, "Type cannot be empty"))
            .transpose()?,
        privacy: diff.privacy,
    })
}

/// Decode an update payload into a field diff
///
/// Recognized keys are `title`, `link`, `type` and `privacy`. Anything else
/// is ignored. A recognized key holding something other than a string is
/// rejected.
pub fn decode_field_diff(payload: &Value) -> CoreResult<ResourceFieldDiff> {
    let object = payload
        .as_object()
        .ok_or_else(|| CoreError::validation("Invalid resource field(s) in request payload"))?;

    let diff = ResourceFieldDiff {
        title: string_field(object, "title")?,
        link: string_field(object, "link")?,
        kind: string_field(object, "type")?,
        privacy: string_field(object, "privacy")?
            .map(|p| {
                p.parse::<Privacy>()
                    .map_err(|e| CoreError::validation(e.to_string()))
            })
            .transpose()?,
    };

    validate_field_diff(&diff)
}

/// Validate and normalize a collection about to be created
pub fn validate_new_collection(collection: &NewCollection) -> CoreResult<NewCollection> {
    Ok(NewCollection {
        name: non_empty(&collection.name, "Collection name cannot be empty")?,
    })
}

fn string_field(object: &Map<String, Value>, key: &str) -> CoreResult<Option<String>> {
    match object.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(CoreError::validation(format!("Field '{}' must be a string", key))),
    }
}

fn non_empty(value: &str, message: &str) -> CoreResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation(message));
    }
    Ok(trimmed.to_string())
}

fn valid_link(link: &str) -> CoreResult<String> {
    let link = non_empty(link, "Link cannot be empty")?;
    let has_scheme = ["http://", "https://"]
        .iter()
        .any(|scheme| link.len() > scheme.len() && link.to_ascii_lowercase().starts_with(scheme));
    if !has_scheme {
        return Err(CoreError::validation("Enter a valid link"));
    }
    Ok(link)
}
