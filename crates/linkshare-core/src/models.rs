//! Data models for linkshare
//!
//! Defines the core data structures: resources, tags, their associations,
//! field diffs for updates, and collections.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Who may read a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    /// Anyone
    #[default]
    Public,
    /// Only the owner
    Owner,
    /// The owner and users following the owner
    Followers,
}

impl Privacy {
    pub const ALL: [Privacy; 3] = [Privacy::Public, Privacy::Owner, Privacy::Followers];

    /// Storage and wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Privacy::Public => "public",
            Privacy::Owner => "owner",
            Privacy::Followers => "followers",
        }
    }
}

impl fmt::Display for Privacy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown privacy level
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Privacy must be one of: public, owner, followers (got '{0}')")]
pub struct ParsePrivacyError(pub String);

impl FromStr for Privacy {
    type Err = ParsePrivacyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Privacy::Public),
            "owner" => Ok(Privacy::Owner),
            "followers" => Ok(Privacy::Followers),
            _ => Err(ParsePrivacyError(s.to_string())),
        }
    }
}

impl ToSql for Privacy {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Privacy {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// A tag identity, already resolved by the caller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub title: String,
}

impl Tag {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
        }
    }

    /// Normalize a raw tag title (trimmed, lowercase)
    pub fn normalize_title(raw: &str) -> String {
        raw.trim().to_lowercase()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}

/// A shared resource (link)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: i64,
    /// Owning user
    pub owner_id: i64,
    pub title: String,
    /// Globally unique URL
    pub link: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub privacy: Privacy,
    /// Number of recommendations; always equals the ledger row count
    pub recommendations: i64,
    /// Associated tags, ordered by title
    pub tags: Vec<Tag>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    /// Titles of the associated tags
    pub fn tag_titles(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.title.clone()).collect()
    }
}

/// Public profile fields of a resource's owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOwner {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// A resource as returned by an access-checked fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDetails {
    #[serde(flatten)]
    pub resource: Resource,
    pub owner: ResourceOwner,
}

/// Fields for a resource about to be created
///
/// There is no owner field: the owner always comes from the authenticated
/// caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewResource {
    pub title: String,
    pub link: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub privacy: Privacy,
}

impl NewResource {
    pub fn new(title: impl Into<String>, link: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            kind: kind.into(),
            privacy: Privacy::default(),
        }
    }

    pub fn with_privacy(mut self, privacy: Privacy) -> Self {
        self.privacy = privacy;
        self
    }
}

/// A scalar resource field that an update may change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceField {
    Title,
    Link,
    Kind,
    Privacy,
}

impl ResourceField {
    /// Column name in the `resources` table
    pub fn column(&self) -> &'static str {
        match self {
            ResourceField::Title => "title",
            ResourceField::Link => "link",
            ResourceField::Kind => "type",
            ResourceField::Privacy => "privacy",
        }
    }
}

/// The set of scalar fields an update changes
///
/// Built by the request decoder; `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceFieldDiff {
    pub title: Option<String>,
    pub link: Option<String>,
    pub kind: Option<String>,
    pub privacy: Option<Privacy>,
}

impl ResourceFieldDiff {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn privacy(mut self, privacy: Privacy) -> Self {
        self.privacy = Some(privacy);
        self
    }

    /// Fields present in this diff, in column order
    pub fn fields(&self) -> Vec<ResourceField> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push(ResourceField::Title);
        }
        if self.link.is_some() {
            fields.push(ResourceField::Link);
        }
        if self.kind.is_some() {
            fields.push(ResourceField::Kind);
        }
        if self.privacy.is_some() {
            fields.push(ResourceField::Privacy);
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}

/// A (resource, tag) join row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceTagAssociation {
    pub resource_id: i64,
    pub tag_id: i64,
}

/// A named collection owned by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for a collection about to be created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCollection {
    pub name: String,
}

impl NewCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_parse() {
        assert_eq!("public".parse::<Privacy>().unwrap(), Privacy::Public);
        assert_eq!("Owner".parse::<Privacy>().unwrap(), Privacy::Owner);
        assert_eq!(" followers ".parse::<Privacy>().unwrap(), Privacy::Followers);
        assert!("friends".parse::<Privacy>().is_err());
    }

    #[test]
    fn test_privacy_default_is_public() {
        assert_eq!(Privacy::default(), Privacy::Public);
    }

    #[test]
    fn test_privacy_serialization() {
        assert_eq!(serde_json::to_string(&Privacy::Followers).unwrap(), "\"followers\"");
        let parsed: Privacy = serde_json::from_str("\"owner\"").unwrap();
        assert_eq!(parsed, Privacy::Owner);
    }

    #[test]
    fn test_tag_normalize_title() {
        assert_eq!(Tag::normalize_title("  Rust "), "rust");
        assert_eq!(Tag::normalize_title("WEB-Dev"), "web-dev");
    }

    #[test]
    fn test_field_diff_fields() {
        let diff = ResourceFieldDiff::default();
        assert!(diff.is_empty());

        let diff = ResourceFieldDiff::default()
            .privacy(Privacy::Owner)
            .title("New");
        assert_eq!(diff.fields(), vec![ResourceField::Title, ResourceField::Privacy]);
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_field_columns() {
        assert_eq!(ResourceField::Kind.column(), "type");
        assert_eq!(ResourceField::Link.column(), "link");
    }

    #[test]
    fn test_new_resource_deserializes_type_field() {
        let json = r#"{"title": "Rust", "link": "https://rust-lang.org", "type": "article"}"#;
        let new: NewResource = serde_json::from_str(json).unwrap();
        assert_eq!(new.kind, "article");
        assert_eq!(new.privacy, Privacy::Public);
    }
}
