//! Resource service
//!
//! The entry point for callers. Each method takes the authenticated user id
//! explicitly, validates its input, and decides the transaction boundary for
//! the stores underneath.
//!
//! A service owns one connection and is meant to live on one worker. Run
//! requests in parallel by giving each worker its own service from
//! [`ResourceService::open`].

use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};
use crate::ledger::RecommendationLedger;
use crate::models::{
    Collection, NewCollection, NewResource, Resource, ResourceDetails, ResourceFieldDiff,
    ResourceTagAssociation, Tag,
};
use crate::payload::{
    validate_field_diff, validate_new_collection, validate_new_resource, validate_resource_id,
};
use crate::storage::{
    begin_read, begin_write, AssociationStore, CollectionStore, Database, ResourceStore,
};
use crate::tags::{reconcile, TagDiff};

/// Result of an update: the resource as stored afterwards and the tag
/// titles that were attached or detached
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub resource: Resource,
    pub added_titles: Vec<String>,
    pub removed_titles: Vec<String>,
}

/// Resource operations over a single connection
pub struct ResourceService {
    conn: Connection,
}

impl ResourceService {
    /// Wrap an already configured connection
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Open a fresh connection to `db`
    pub fn open(db: &Database) -> CoreResult<Self> {
        Ok(Self::new(db.connect()?))
    }

    /// The underlying connection, for the user and tag directories
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Create a resource owned by `owner_id` and attach `tags`
    ///
    /// The resource and its tags are written in two transactions. If
    /// attaching the tags fails, the resource stays without them and the
    /// error is returned.
    pub fn create_resource(
        &self,
        owner_id: i64,
        resource: &NewResource,
        tags: &[Tag],
    ) -> CoreResult<Resource> {
        let resource = validate_new_resource(resource)?;

        let tx = begin_write(&self.conn)?;
        let mut created = ResourceStore::new(&tx).create(owner_id, &resource)?;
        tx.commit()
            .map_err(|e| CoreError::storage(e, "committing new resource"))?;

        if tags.is_empty() {
            return Ok(created);
        }

        let plan = reconcile(created.id, &TagDiff::adding(tags.to_vec()));
        if let Err(err) = self.attach_tags(&plan.insertions) {
            warn!(
                resource_id = created.id,
                error = %err,
                "Resource created but its tags could not be attached"
            );
            return Err(err);
        }

        created.tags = ResourceStore::new(&self.conn).tags_for(created.id)?;
        Ok(created)
    }

    /// Update scalar fields and tags of a resource owned by `owner_id`
    ///
    /// Everything happens in one write transaction. Ownership is checked
    /// before any tag is touched, also when `diff` is empty. An update with
    /// no field and no tag change is rejected.
    pub fn update_resource(
        &self,
        resource_id: i64,
        owner_id: i64,
        diff: &ResourceFieldDiff,
        add: &[Tag],
        remove: &[Tag],
    ) -> CoreResult<UpdateOutcome> {
        validate_resource_id(resource_id)?;
        let diff = validate_field_diff(diff)?;
        let tag_diff = TagDiff::new(add.to_vec(), remove.to_vec());

        if diff.is_empty() && tag_diff.is_empty() {
            return Err(CoreError::validation(
                "Invalid resource field(s) in request payload",
            ));
        }

        let tx = begin_write(&self.conn)?;
        let store = ResourceStore::new(&tx);

        // Scoped by owner; fails before any tag change if not ours
        let mut resource = store.update_fields(resource_id, owner_id, &diff)?;

        let plan = reconcile(resource_id, &tag_diff);
        let associations = AssociationStore::new(&tx);
        associations.bulk_insert(&plan.insertions)?;
        associations.bulk_delete(resource_id, &plan.deletions)?;

        if !plan.is_empty() {
            resource.tags = store.tags_for(resource_id)?;
        }

        tx.commit()
            .map_err(|e| CoreError::storage(e, "committing resource update"))?;

        info!(
            resource_id,
            owner_id,
            fields = diff.fields().len(),
            added = plan.added_titles.len(),
            removed = plan.removed_titles.len(),
            "Updated resource"
        );

        Ok(UpdateOutcome {
            resource,
            added_titles: plan.added_titles,
            removed_titles: plan.removed_titles,
        })
    }

    /// Delete a resource owned by `owner_id`
    pub fn delete_resource(&self, resource_id: i64, owner_id: i64) -> CoreResult<()> {
        validate_resource_id(resource_id)?;

        let tx = begin_write(&self.conn)?;
        ResourceStore::new(&tx).delete(resource_id, owner_id)?;
        tx.commit()
            .map_err(|e| CoreError::storage(e, "committing resource deletion"))
    }

    /// Recommend a resource; returns the new recommendation count
    pub fn recommend_resource(&self, resource_id: i64, user_id: i64) -> CoreResult<i64> {
        validate_resource_id(resource_id)?;
        RecommendationLedger::new(&self.conn).recommend(resource_id, user_id)
    }

    /// Read a resource if `requester_id` may see it
    pub fn fetch_resource(&self, resource_id: i64, requester_id: i64) -> CoreResult<ResourceDetails> {
        validate_resource_id(resource_id)?;

        let tx = begin_read(&self.conn)?;
        let details = ResourceStore::new(&tx).fetch_with_access_check(resource_id, requester_id)?;
        tx.commit()
            .map_err(|e| CoreError::storage(e, "finishing resource read"))?;
        Ok(details)
    }

    /// Create a named collection owned by `owner_id`
    pub fn create_collection(
        &self,
        owner_id: i64,
        collection: &NewCollection,
    ) -> CoreResult<Collection> {
        let collection = validate_new_collection(collection)?;
        CollectionStore::new(&self.conn).create(owner_id, &collection)
    }

    /// Collections owned by `owner_id`, ordered by name
    pub fn list_collections(&self, owner_id: i64) -> CoreResult<Vec<Collection>> {
        CollectionStore::new(&self.conn).list_for_owner(owner_id)
    }

    fn attach_tags(&self, insertions: &[ResourceTagAssociation]) -> CoreResult<()> {
        let tx = begin_write(&self.conn)?;
        AssociationStore::new(&tx).bulk_insert(insertions)?;
        tx.commit()
            .map_err(|e| CoreError::storage(e, "committing resource tags"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConflictKind, ErrorKind};
    use crate::models::Privacy;
    use crate::payload::decode_field_diff;
    use crate::storage::{TagDirectory, UserDirectory};
    use std::time::Duration;
    use tempfile::TempDir;

    const ALICE: i64 = 1;
    const BOB: i64 = 2;
    const CAROL: i64 = 3;

    fn setup() -> (TempDir, Database, ResourceService) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open_at(temp_dir.path().join("test.db"), Duration::from_secs(5))
            .unwrap();
        let service = ResourceService::open(&db).unwrap();

        let users = UserDirectory::new(service.connection());
        for name in ["alice", "bob", "carol"] {
            users
                .register(name, &format!("{}@example.com", name))
                .unwrap();
        }

        (temp_dir, db, service)
    }

    fn tags(service: &ResourceService, titles: &[&str]) -> Vec<Tag> {
        let titles: Vec<String> = titles.iter().map(|t| t.to_string()).collect();
        TagDirectory::new(service.connection())
            .resolve_or_create(&titles)
            .unwrap()
    }

    fn rust_resource() -> NewResource {
        NewResource::new("Rust", "https://rust-lang.org", "site")
    }

    fn row_count(service: &ResourceService, table: &str) -> i64 {
        service
            .connection()
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })
            .unwrap()
    }

    #[test]
    fn test_create_with_tags() {
        let (_dir, _db, service) = setup();
        let tags = tags(&service, &["web", "lang", "web"]);

        let created = service
            .create_resource(ALICE, &rust_resource(), &tags)
            .unwrap();

        assert_eq!(created.owner_id, ALICE);
        assert_eq!(created.tag_titles(), vec!["lang", "web"]);
        assert_eq!(row_count(&service, "resource_tags"), 2);
    }

    #[test]
    fn test_create_validates_input() {
        let (_dir, _db, service) = setup();

        let err = service
            .create_resource(ALICE, &NewResource::new(" ", "https://a.com", "site"), &[])
            .unwrap_err();
        assert_eq!(err.to_string(), "Title cannot be empty");

        let err = service
            .create_resource(ALICE, &NewResource::new("A", "ftp://a.com", "site"), &[])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(row_count(&service, "resources"), 0);
    }

    #[test]
    fn test_create_duplicate_link() {
        let (_dir, _db, service) = setup();
        service.create_resource(ALICE, &rust_resource(), &[]).unwrap();

        let err = service
            .create_resource(BOB, &rust_resource(), &[])
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(ConflictKind::LinkTaken)));
    }

    #[test]
    fn test_create_keeps_resource_when_tags_fail() {
        let (_dir, _db, service) = setup();
        let missing = Tag::new(999, "ghost");

        let err = service
            .create_resource(ALICE, &rust_resource(), &[missing])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);

        assert_eq!(row_count(&service, "resources"), 1);
        assert_eq!(row_count(&service, "resource_tags"), 0);
    }

    #[test]
    fn test_update_fields_and_tags() {
        let (_dir, _db, service) = setup();
        let initial = tags(&service, &["lang", "old"]);
        let created = service
            .create_resource(ALICE, &rust_resource(), &initial)
            .unwrap();

        let add = tags(&service, &["systems"]);
        let remove = tags(&service, &["old"]);
        let diff = ResourceFieldDiff::default().title("The Rust Language");

        let outcome = service
            .update_resource(created.id, ALICE, &diff, &add, &remove)
            .unwrap();

        assert_eq!(outcome.resource.title, "The Rust Language");
        assert_eq!(outcome.resource.tag_titles(), vec!["lang", "systems"]);
        assert_eq!(outcome.added_titles, vec!["systems"]);
        assert_eq!(outcome.removed_titles, vec!["old"]);
    }

    #[test]
    fn test_update_unrecognized_keys_still_applies_tags() {
        let (_dir, _db, service) = setup();
        let created = service.create_resource(ALICE, &rust_resource(), &[]).unwrap();

        let diff = decode_field_diff(&serde_json::json!({ "colour": "red" })).unwrap();
        let add = tags(&service, &["lang"]);

        let outcome = service
            .update_resource(created.id, ALICE, &diff, &add, &[])
            .unwrap();

        assert_eq!(outcome.resource.title, "Rust");
        assert_eq!(outcome.resource.updated_at, created.updated_at);
        assert_eq!(outcome.resource.tag_titles(), vec!["lang"]);
    }

    #[test]
    fn test_update_with_nothing_to_do() {
        let (_dir, _db, service) = setup();
        let created = service.create_resource(ALICE, &rust_resource(), &[]).unwrap();

        let err = service
            .update_resource(created.id, ALICE, &ResourceFieldDiff::default(), &[], &[])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_update_by_non_owner_touches_nothing() {
        let (_dir, _db, service) = setup();
        let created = service.create_resource(ALICE, &rust_resource(), &[]).unwrap();
        let add = tags(&service, &["spam"]);

        // Tags only: ownership is still checked
        let err = service
            .update_resource(created.id, BOB, &ResourceFieldDiff::default(), &add, &[])
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFoundOrForbidden));

        let diff = ResourceFieldDiff::default().title("Hijacked");
        let err = service
            .update_resource(created.id, BOB, &diff, &add, &[])
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFoundOrForbidden));

        let details = service.fetch_resource(created.id, ALICE).unwrap();
        assert_eq!(details.resource.title, "Rust");
        assert!(details.resource.tags.is_empty());
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let (_dir, _db, service) = setup();
        let lang = tags(&service, &["lang"]);
        let created = service
            .create_resource(ALICE, &rust_resource(), &lang)
            .unwrap();

        // Attaching an already attached tag fails after the title changed
        let diff = ResourceFieldDiff::default().title("Changed");
        let err = service
            .update_resource(created.id, ALICE, &diff, &lang, &[])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);

        let details = service.fetch_resource(created.id, ALICE).unwrap();
        assert_eq!(details.resource.title, "Rust");
    }

    #[test]
    fn test_update_link_conflict() {
        let (_dir, _db, service) = setup();
        service.create_resource(ALICE, &rust_resource(), &[]).unwrap();
        let other = service
            .create_resource(ALICE, &NewResource::new("Docs", "https://docs.rs", "site"), &[])
            .unwrap();

        let diff = ResourceFieldDiff::default().link("https://rust-lang.org");
        let err = service
            .update_resource(other.id, ALICE, &diff, &[], &[])
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(ConflictKind::LinkTaken)));
    }

    #[test]
    fn test_invalid_resource_id() {
        let (_dir, _db, service) = setup();

        let err = service.fetch_resource(0, ALICE).unwrap_err();
        assert_eq!(err.to_string(), "Invalid resource Id in request");
        assert!(service.delete_resource(-1, ALICE).is_err());
        assert!(service.recommend_resource(0, ALICE).is_err());
    }

    #[test]
    fn test_delete_by_non_owner_then_owner() {
        let (_dir, _db, service) = setup();
        let lang = tags(&service, &["lang"]);
        let created = service
            .create_resource(ALICE, &rust_resource(), &lang)
            .unwrap();
        service.recommend_resource(created.id, BOB).unwrap();

        let err = service.delete_resource(created.id, BOB).unwrap_err();
        assert!(matches!(err, CoreError::NotFoundOrForbidden));

        service.delete_resource(created.id, ALICE).unwrap();
        assert_eq!(row_count(&service, "resources"), 0);
        assert_eq!(row_count(&service, "resource_tags"), 0);
        assert_eq!(row_count(&service, "recommendations"), 0);
    }

    #[test]
    fn test_fetch_followers_only() {
        let (_dir, _db, service) = setup();
        let created = service
            .create_resource(
                ALICE,
                &rust_resource().with_privacy(Privacy::Followers),
                &[],
            )
            .unwrap();

        let err = service.fetch_resource(created.id, BOB).unwrap_err();
        assert!(matches!(err, CoreError::NotFoundOrForbidden));

        UserDirectory::new(service.connection())
            .follow(BOB, ALICE)
            .unwrap();

        let details = service.fetch_resource(created.id, BOB).unwrap();
        assert_eq!(details.resource.id, created.id);
        assert_eq!(details.owner.username, "alice");
        assert!(service.fetch_resource(created.id, CAROL).is_err());
    }

    #[test]
    fn test_owner_only_resource_scenario() {
        let (_dir, _db, service) = setup();
        for i in 1..=4 {
            service
                .create_resource(
                    BOB,
                    &NewResource::new("Filler", format!("https://filler.com/{}", i), "site"),
                    &[],
                )
                .unwrap();
        }
        let created = service
            .create_resource(
                ALICE,
                &rust_resource().with_privacy(Privacy::Owner),
                &[],
            )
            .unwrap();
        assert_eq!(created.id, 5);

        let err = service.fetch_resource(5, BOB).unwrap_err();
        assert!(matches!(err, CoreError::NotFoundOrForbidden));

        let details = service.fetch_resource(5, ALICE).unwrap();
        assert_eq!(details.resource.title, "Rust");
        assert_eq!(details.resource.privacy, Privacy::Owner);
        assert_eq!(details.owner.email, "alice@example.com");

        assert_eq!(service.recommend_resource(5, ALICE).unwrap(), 1);
        let details = service.fetch_resource(5, ALICE).unwrap();
        assert_eq!(details.resource.recommendations, 1);
    }

    #[test]
    fn test_recommend_twice() {
        let (_dir, _db, service) = setup();
        let created = service.create_resource(ALICE, &rust_resource(), &[]).unwrap();

        assert_eq!(service.recommend_resource(created.id, BOB).unwrap(), 1);
        let err = service.recommend_resource(created.id, BOB).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Conflict(ConflictKind::AlreadyRecommended)
        ));
        assert!(matches!(
            service.recommend_resource(404, BOB),
            Err(CoreError::NotFound)
        ));
    }

    #[test]
    fn test_workers_share_nothing_but_the_database() {
        let (_dir, db, service) = setup();
        let resource_id = service
            .create_resource(ALICE, &rust_resource(), &[])
            .unwrap()
            .id;

        let handles: Vec<_> = [ALICE, BOB, CAROL]
            .into_iter()
            .map(|user_id| {
                let db = db.clone();
                std::thread::spawn(move || {
                    ResourceService::open(&db)
                        .unwrap()
                        .recommend_resource(resource_id, user_id)
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let details = service.fetch_resource(resource_id, CAROL).unwrap();
        assert_eq!(details.resource.recommendations, 3);
        assert_eq!(row_count(&service, "recommendations"), 3);
    }

    #[test]
    fn test_collections() {
        let (_dir, _db, service) = setup();

        let created = service
            .create_collection(ALICE, &NewCollection::new("  reading  "))
            .unwrap();
        assert_eq!(created.name, "reading");

        let err = service
            .create_collection(ALICE, &NewCollection::new(""))
            .unwrap_err();
        assert_eq!(err.to_string(), "Collection name cannot be empty");

        let err = service
            .create_collection(ALICE, &NewCollection::new("reading"))
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Conflict(ConflictKind::CollectionExists)
        ));

        assert_eq!(service.list_collections(ALICE).unwrap().len(), 1);
        assert!(service.list_collections(BOB).unwrap().is_empty());
    }

    #[test]
    fn test_interrupted_write_is_timeout_and_leaves_nothing() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;
        use std::thread;

        let (_dir, _db, service) = setup();
        let created = service
            .create_resource(ALICE, &rust_resource(), &[])
            .unwrap();
        let tags_before = row_count(&service, "tags");

        let handle = service.connection().get_interrupt_handle();
        let done = Arc::new(AtomicBool::new(false));
        let interrupter = {
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    handle.interrupt();
                    thread::sleep(Duration::from_millis(5));
                }
            })
        };

        let tx = begin_write(service.connection()).unwrap();
        let result = tx
            .execute(
                r#"
                WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n)
                INSERT INTO tags (title) SELECT 'bulk-' || i FROM n LIMIT 100000000
                "#,
                [],
            )
            .map_err(|e| CoreError::storage(e, "bulk tagging"));

        done.store(true, Ordering::SeqCst);
        interrupter.join().unwrap();
        drop(tx);

        let err = result.unwrap_err();
        assert!(matches!(err, CoreError::Timeout(_)));
        assert!(err.is_retryable());

        // Nothing from the interrupted statement survived
        assert_eq!(row_count(&service, "tags"), tags_before);

        // The connection is still usable
        let details = service.fetch_resource(created.id, ALICE).unwrap();
        assert_eq!(details.resource.id, created.id);
    }
}
