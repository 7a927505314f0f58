//! SQLite-backed metadata store for Scholara Collective.
//!
//! Holds subjects (unique by `value`), users with their API tokens,
//! uploaded resources with extracted text, and per-user ratings. The
//! contributor directory is an aggregate over resources, not a table.

mod db;

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use thiserror::Error;

use scholara_core::{
    Contributor, NewResource, NewUser, RatingSummary, Resource, ResourceSummary, Role, Subject,
    User,
};

pub use db::SCHEMA_VERSION;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("subject '{0}' already exists")]
    DuplicateSubject(String),
    #[error("a user with email '{0}' already exists")]
    DuplicateEmail(String),
    #[error("an admin account is already configured")]
    AdminExists,
    #[error("resource '{0}' not found")]
    ResourceNotFound(String),
    #[error("unknown subject '{0}'")]
    UnknownSubject(String),
}

/// Handle to an opened metadata store.
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Store {
    /// Open (or create) a store at `path` and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        db::init_database(&conn)?;
        tracing::info!(path = %path.display(), "opened metadata store");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        db::init_database(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// Path of the backing file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn schema_version(&self) -> Result<Option<String>, StoreError> {
        db::get_metadata(&self.conn, "schema_version")
    }

    // ── Subjects ────────────────────────────────────────────────────────

    /// All subjects in insertion order.
    pub fn subjects(&self) -> Result<Vec<Subject>, StoreError> {
        db::list_subjects(&self.conn)
    }

    /// Insert a subject; a duplicate `value` fails with
    /// [`StoreError::DuplicateSubject`].
    pub fn add_subject(&self, subject: &Subject) -> Result<(), StoreError> {
        db::insert_subject(&self.conn, subject)
    }

    /// Insert subjects that do not exist yet. Returns the number inserted.
    pub fn seed_subjects(&self, subjects: &[Subject]) -> Result<usize, StoreError> {
        db::seed_subjects(&self.conn, subjects)
    }

    // ── Users ───────────────────────────────────────────────────────────

    /// Create a user and issue their API token.
    pub fn create_user(&self, user: &NewUser) -> Result<(User, String), StoreError> {
        let id = new_id();
        let token = new_id();
        db::insert_user(&self.conn, &id, &token, user, now_secs())?;
        let created = db::user_by_id(&self.conn, &id)?
            .ok_or(StoreError::Database(rusqlite::Error::QueryReturnedNoRows))?;
        Ok((created, token))
    }

    pub fn user_by_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        db::user_by_token(&self.conn, token)
    }

    pub fn user(&self, id: &str) -> Result<Option<User>, StoreError> {
        db::user_by_id(&self.conn, id)
    }

    pub fn admin_exists(&self) -> Result<bool, StoreError> {
        db::admin_exists(&self.conn)
    }

    /// One-time admin bootstrap.
    ///
    /// Fails with [`StoreError::AdminExists`] once any admin exists. If a
    /// user with the same e-mail is already registered they are promoted and
    /// keep their token; otherwise a new admin account is created.
    pub fn setup_admin(&self, user: &NewUser) -> Result<(User, String), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        if db::admin_exists(&tx)? {
            return Err(StoreError::AdminExists);
        }

        let result = match db::user_by_email(&tx, &user.email)? {
            Some((existing, token)) => {
                db::set_role(&tx, &existing.id, Role::Admin)?;
                let promoted = User {
                    role: Role::Admin,
                    ..existing
                };
                (promoted, token)
            }
            None => {
                let id = new_id();
                let token = new_id();
                let admin = NewUser {
                    role: Role::Admin,
                    ..user.clone()
                };
                db::insert_user(&tx, &id, &token, &admin, now_secs())?;
                let created = db::user_by_id(&tx, &id)?
                    .ok_or(StoreError::Database(rusqlite::Error::QueryReturnedNoRows))?;
                (created, token)
            }
        };

        tx.commit()?;
        Ok(result)
    }

    // ── Contributions ───────────────────────────────────────────────────

    pub fn contribution_count(&self, user_id: &str) -> Result<u64, StoreError> {
        db::contribution_count(&self.conn, user_id)
    }

    pub fn contributors(&self) -> Result<Vec<Contributor>, StoreError> {
        db::contributors(&self.conn)
    }

    // ── Resources ───────────────────────────────────────────────────────

    /// Store an uploaded resource. The subject must already exist.
    pub fn add_resource(&self, resource: &NewResource) -> Result<Resource, StoreError> {
        if !db::subject_exists(&self.conn, &resource.subject)? {
            return Err(StoreError::UnknownSubject(resource.subject.clone()));
        }
        let id = new_id();
        db::insert_resource(&self.conn, &id, resource, now_secs())?;
        db::get_resource(&self.conn, &id)?.ok_or(StoreError::ResourceNotFound(id))
    }

    pub fn subject_exists(&self, value: &str) -> Result<bool, StoreError> {
        db::subject_exists(&self.conn, value)
    }

    pub fn resource(&self, id: &str) -> Result<Option<Resource>, StoreError> {
        db::get_resource(&self.conn, id)
    }

    /// Newest first, optionally restricted to a subject and/or a
    /// case-insensitive text match on title, description, or body.
    pub fn resources(
        &self,
        subject: Option<&str>,
        query: Option<&str>,
    ) -> Result<Vec<ResourceSummary>, StoreError> {
        db::list_resources(&self.conn, subject, query)
    }

    /// Record `user_id`'s rating, replacing any earlier one.
    pub fn rate_resource(
        &self,
        resource_id: &str,
        user_id: &str,
        rating: u8,
    ) -> Result<RatingSummary, StoreError> {
        if !db::resource_exists(&self.conn, resource_id)? {
            return Err(StoreError::ResourceNotFound(resource_id.to_string()));
        }
        db::upsert_rating(&self.conn, resource_id, user_id, rating)?;
        db::rating_summary(&self.conn, resource_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_subject() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .add_subject(&Subject::new("cs", "Computer Science", "STEM"))
            .unwrap();
        store
    }

    fn user(store: &Store, email: &str) -> User {
        store
            .create_user(&NewUser {
                name: Some(email.split('@').next().unwrap().to_string()),
                email: email.into(),
                profile_picture: None,
                role: Role::User,
            })
            .unwrap()
            .0
    }

    fn upload(store: &Store, uploader: &User, title: &str, text: &str) -> Resource {
        store
            .add_resource(&NewResource {
                title: title.into(),
                description: None,
                subject: "cs".into(),
                file_name: "notes.txt".into(),
                mime_type: "text/plain".into(),
                size_bytes: text.len() as u64,
                text: text.into(),
                uploader_id: uploader.id.clone(),
            })
            .unwrap()
    }

    #[test]
    fn test_setup_admin_only_once() {
        let store = Store::open_in_memory().unwrap();
        let admin = NewUser {
            name: Some("Root".into()),
            email: "root@uni.edu".into(),
            profile_picture: None,
            role: Role::User,
        };
        let (created, token) = store.setup_admin(&admin).unwrap();
        assert!(created.is_admin());
        assert_eq!(store.user_by_token(&token).unwrap().unwrap().id, created.id);

        let again = store.setup_admin(&NewUser {
            email: "other@uni.edu".into(),
            ..admin
        });
        assert!(matches!(again, Err(StoreError::AdminExists)));
    }

    #[test]
    fn test_setup_admin_promotes_existing_user() {
        let store = Store::open_in_memory().unwrap();
        let existing = user(&store, "ada@uni.edu");
        let (admin, _) = store
            .setup_admin(&NewUser {
                name: None,
                email: "ada@uni.edu".into(),
                profile_picture: None,
                role: Role::User,
            })
            .unwrap();
        assert_eq!(admin.id, existing.id);
        assert!(store.user(&existing.id).unwrap().unwrap().is_admin());
    }

    #[test]
    fn test_contributors_counts_uploads() {
        let store = store_with_subject();
        let ada = user(&store, "ada@uni.edu");
        let bob = user(&store, "bob@uni.edu");
        let _lurker = user(&store, "lurker@uni.edu");
        upload(&store, &ada, "Graphs", "bfs dfs");
        upload(&store, &ada, "Trees", "avl");
        upload(&store, &bob, "Heaps", "binary heap");

        let contributors = store.contributors().unwrap();
        assert_eq!(contributors.len(), 2);
        assert_eq!(contributors[0].user_id, ada.id);
        assert_eq!(contributors[0].contribution_count, 2);
        assert_eq!(store.contribution_count(&bob.id).unwrap(), 1);
    }

    #[test]
    fn test_resource_requires_known_subject() {
        let store = store_with_subject();
        let ada = user(&store, "ada@uni.edu");
        let err = store
            .add_resource(&NewResource {
                title: "X".into(),
                description: None,
                subject: "astrology".into(),
                file_name: "x.txt".into(),
                mime_type: "text/plain".into(),
                size_bytes: 1,
                text: "x".into(),
                uploader_id: ada.id,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownSubject(_)));
    }

    #[test]
    fn test_resource_search_and_ratings() {
        let store = store_with_subject();
        let ada = user(&store, "ada@uni.edu");
        let bob = user(&store, "bob@uni.edu");
        let graphs = upload(&store, &ada, "Graph Algorithms", "Dijkstra shortest paths");
        upload(&store, &ada, "Sorting", "quicksort and mergesort");

        let hits = store.resources(None, Some("DIJKSTRA")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, graphs.id);
        assert_eq!(hits[0].word_count, 3);
        assert_eq!(store.resources(Some("cs"), None).unwrap().len(), 2);
        assert!(store.resources(Some("bio"), None).unwrap().is_empty());

        store.rate_resource(&graphs.id, &ada.id, 2).unwrap();
        let summary = store.rate_resource(&graphs.id, &bob.id, 4).unwrap();
        assert_eq!(summary.rating_count, 2);
        assert_eq!(summary.average_rating, Some(3.0));

        // Re-rating replaces the earlier value
        let summary = store.rate_resource(&graphs.id, &ada.id, 5).unwrap();
        assert_eq!(summary.rating_count, 2);
        assert_eq!(summary.average_rating, Some(4.5));

        let listed = store.resources(None, Some("graph")).unwrap();
        assert_eq!(listed[0].average_rating, Some(4.5));

        let missing = store.rate_resource("nope", &ada.id, 3);
        assert!(matches!(missing, Err(StoreError::ResourceNotFound(_))));
    }

    #[test]
    fn test_reopen_file_store_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scholara.db");
        {
            let store = Store::open(&path).unwrap();
            store
                .add_subject(&Subject::new("law", "Law", "Humanities"))
                .unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert_eq!(store.subjects().unwrap().len(), 1);
        assert_eq!(store.path(), Some(path.as_path()));
        assert_eq!(store.schema_version().unwrap().as_deref(), Some(SCHEMA_VERSION));
    }
}
