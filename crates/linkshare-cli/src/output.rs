//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use linkshare_core::{Collection, Resource, ResourceDetails, UpdateOutcome, User};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - ids only
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a resource with its owner, as returned by `resource show`
    pub fn print_details(&self, details: &ResourceDetails) {
        match self.format {
            OutputFormat::Human => {
                print_resource_fields(&details.resource);
                println!(
                    "Owner:       {} <{}>",
                    details.owner.username, details.owner.email
                );
            }
            OutputFormat::Json => println!("{}", to_json(details)),
            OutputFormat::Quiet => println!("{}", details.resource.id),
        }
    }

    /// Print a resource just written
    pub fn print_resource(&self, resource: &Resource) {
        match self.format {
            OutputFormat::Human => print_resource_fields(resource),
            OutputFormat::Json => println!("{}", to_json(resource)),
            OutputFormat::Quiet => println!("{}", resource.id),
        }
    }

    /// Print the result of an update
    pub fn print_update(&self, outcome: &UpdateOutcome) {
        match self.format {
            OutputFormat::Human => {
                print_resource_fields(&outcome.resource);
                if !outcome.added_titles.is_empty() {
                    println!("Added:       {}", outcome.added_titles.join(", "));
                }
                if !outcome.removed_titles.is_empty() {
                    println!("Removed:     {}", outcome.removed_titles.join(", "));
                }
            }
            OutputFormat::Json => println!("{}", to_json(outcome)),
            OutputFormat::Quiet => println!("{}", outcome.resource.id),
        }
    }

    /// Print a new recommendation count
    pub fn print_recommendations(&self, resource_id: i64, count: i64) {
        match self.format {
            OutputFormat::Human => {
                println!("✓ Recommended resource {} ({} total)", resource_id, count)
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"resourceId": resource_id, "recommendations": count})
                );
            }
            OutputFormat::Quiet => println!("{}", count),
        }
    }

    /// Print a list of collections
    pub fn print_collections(&self, collections: &[Collection]) {
        match self.format {
            OutputFormat::Human => {
                if collections.is_empty() {
                    println!("No collections found.");
                    return;
                }
                for collection in collections {
                    println!(
                        "{:>5} | {} | {}",
                        collection.id,
                        collection.name,
                        collection.created_at.format("%Y-%m-%d")
                    );
                }
                println!("\n{} collection(s)", collections.len());
            }
            OutputFormat::Json => println!("{}", to_json(&collections)),
            OutputFormat::Quiet => {
                for collection in collections {
                    println!("{}", collection.id);
                }
            }
        }
    }

    /// Print a single collection
    pub fn print_collection(&self, collection: &Collection) {
        match self.format {
            OutputFormat::Human => {
                println!("✓ Created collection {}: {}", collection.id, collection.name)
            }
            OutputFormat::Json => println!("{}", to_json(collection)),
            OutputFormat::Quiet => println!("{}", collection.id),
        }
    }

    /// Print a registered user
    pub fn print_user(&self, user: &User) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:          {}", user.id);
                println!("Username:    {}", user.username);
                println!("Email:       {}", user.email);
            }
            OutputFormat::Json => println!("{}", to_json(user)),
            OutputFormat::Quiet => println!("{}", user.id),
        }
    }

    /// Print a list of tags
    pub fn print_tags(&self, tags: &[(String, i64)]) {
        match self.format {
            OutputFormat::Human => {
                if tags.is_empty() {
                    println!("No tags found.");
                    return;
                }
                for (name, count) in tags {
                    println!("{} ({})", name, count);
                }
                println!("\n{} tag(s)", tags.len());
            }
            OutputFormat::Json => {
                let json_tags: Vec<_> = tags
                    .iter()
                    .map(|(name, count)| serde_json::json!({"name": name, "count": count}))
                    .collect();
                println!("{}", to_json(&json_tags));
            }
            OutputFormat::Quiet => {
                for (name, _) in tags {
                    println!("{}", name);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_resource_fields(resource: &Resource) {
    println!("ID:          {}", resource.id);
    println!("Title:       {}", resource.title);
    println!("Link:        {}", resource.link);
    println!("Type:        {}", resource.kind);
    println!("Privacy:     {}", resource.privacy);
    println!("Recommended: {}", resource.recommendations);
    println!("Tags:        {}", tag_list(&resource.tag_titles()));
    println!(
        "Created:     {}",
        resource.created_at.format("%Y-%m-%d %H:%M")
    );
    println!(
        "Updated:     {}",
        resource.updated_at.format("%Y-%m-%d %H:%M")
    );
}

/// Comma-separated titles, or a placeholder when there are none
fn tag_list(titles: &[String]) -> String {
    if titles.is_empty() {
        "(none)".to_string()
    } else {
        titles.join(", ")
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}).to_string())
}
