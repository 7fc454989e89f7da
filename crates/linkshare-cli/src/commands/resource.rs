//! Resource command handlers
//!
//! Tag titles given on the command line are resolved to tag identities
//! here, before the service sees them: titles to attach are created when
//! missing, titles to detach must already exist.

use anyhow::{Context, Result};

use linkshare_core::payload::decode_field_diff;
use linkshare_core::{NewResource, Privacy, ResourceFieldDiff, ResourceService, TagDirectory};

use crate::output::Output;

/// Arguments of `resource update`
#[derive(Debug, Default)]
pub struct UpdateRequest {
    pub title: Option<String>,
    pub link: Option<String>,
    pub kind: Option<String>,
    pub privacy: Option<Privacy>,
    /// Raw JSON object of fields; individual flags win over it
    pub fields: Option<String>,
    pub add_tags: Vec<String>,
    pub remove_tags: Vec<String>,
}

impl UpdateRequest {
    /// Build the field diff from `--fields` and the individual flags
    pub fn field_diff(&self) -> Result<ResourceFieldDiff> {
        let mut diff = match &self.fields {
            Some(raw) => {
                let payload: serde_json::Value =
                    serde_json::from_str(raw).context("--fields is not valid JSON")?;
                decode_field_diff(&payload)?
            }
            None => ResourceFieldDiff::default(),
        };

        if let Some(title) = &self.title {
            diff.title = Some(title.clone());
        }
        if let Some(link) = &self.link {
            diff.link = Some(link.clone());
        }
        if let Some(kind) = &self.kind {
            diff.kind = Some(kind.clone());
        }
        if let Some(privacy) = self.privacy {
            diff.privacy = Some(privacy);
        }

        Ok(diff)
    }
}

/// Create a resource owned by the acting user
pub fn create(
    service: &ResourceService,
    owner_id: i64,
    resource: NewResource,
    tags: Vec<String>,
    output: &Output,
) -> Result<()> {
    let tags = TagDirectory::new(service.connection()).resolve_or_create(&tags)?;
    let created = service.create_resource(owner_id, &resource, &tags)?;

    output.success(&format!("Created resource: {}", created.id));
    output.print_resource(&created);
    Ok(())
}

/// Update fields and tags of a resource owned by the acting user
pub fn update(
    service: &ResourceService,
    owner_id: i64,
    resource_id: i64,
    request: UpdateRequest,
    output: &Output,
) -> Result<()> {
    let diff = request.field_diff()?;

    let tags = TagDirectory::new(service.connection());
    let add = tags.resolve_or_create(&request.add_tags)?;
    let remove = tags.resolve_existing(&request.remove_tags)?;

    let outcome = service.update_resource(resource_id, owner_id, &diff, &add, &remove)?;
    output.print_update(&outcome);
    Ok(())
}

/// Delete a resource owned by the acting user
pub fn delete(
    service: &ResourceService,
    owner_id: i64,
    resource_id: i64,
    output: &Output,
) -> Result<()> {
    service.delete_resource(resource_id, owner_id)?;
    output.success(&format!("Deleted resource: {}", resource_id));
    Ok(())
}

/// Recommend a resource as the acting user
pub fn recommend(
    service: &ResourceService,
    user_id: i64,
    resource_id: i64,
    output: &Output,
) -> Result<()> {
    let count = service.recommend_resource(resource_id, user_id)?;
    output.print_recommendations(resource_id, count);
    Ok(())
}

/// Show a resource the acting user may see
pub fn show(
    service: &ResourceService,
    requester_id: i64,
    resource_id: i64,
    output: &Output,
) -> Result<()> {
    let details = service.fetch_resource(resource_id, requester_id)?;
    output.print_details(&details);
    Ok(())
}
