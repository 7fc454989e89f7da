//! Tag command handlers

use anyhow::Result;

use linkshare_core::{ResourceService, TagDirectory};

use crate::output::Output;

/// List all tags with usage counts
pub fn list(service: &ResourceService, output: &Output) -> Result<()> {
    let tags = TagDirectory::new(service.connection()).with_counts()?;
    output.print_tags(&tags);
    Ok(())
}
