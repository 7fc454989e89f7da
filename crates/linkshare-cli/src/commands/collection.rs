//! Collection command handlers

use anyhow::Result;

use linkshare_core::{NewCollection, ResourceService};

use crate::output::Output;

/// Create a collection owned by the acting user
pub fn create(
    service: &ResourceService,
    owner_id: i64,
    name: String,
    output: &Output,
) -> Result<()> {
    let collection = service.create_collection(owner_id, &NewCollection::new(name))?;
    output.print_collection(&collection);
    Ok(())
}

/// List the acting user's collections
pub fn list(service: &ResourceService, owner_id: i64, output: &Output) -> Result<()> {
    let collections = service.list_collections(owner_id)?;
    output.print_collections(&collections);
    Ok(())
}
