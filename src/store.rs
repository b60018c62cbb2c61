//! SQLite persistence for tracked repositories and credentials

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use indexmap::IndexMap;
use rusqlite::{Connection, Row, params};
use tracing::{debug, info};

use crate::config::{DEFAULT_REPO_NAME, DEFAULT_REPO_OWNER};
use crate::error::StoreError;

/// Schema migrations
/// Each version contains a list of SQL statements to execute
const MIGRATIONS: &[&[&str]] = &[
    // v1: advisory last-checked version
    &["ALTER TABLE tracked_repos ADD COLUMN last_checked_version TEXT"],
];

/// A GitHub repository being watched
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedRepository {
    pub id: i64,
    pub owner: String,
    pub name: String,
    /// Global fallback package identifier, may be blank until the first
    /// artifact inspection fills it in
    pub package_id: String,
    pub display_name: String,
    pub owner_avatar_url: Option<String>,
    pub access_token: Option<String>,
    pub last_checked_version: Option<String>,
    /// Track name ("Release"/"Pre-Release") to package identifier
    pub track_package_ids: IndexMap<String, String>,
}

impl TrackedRepository {
    pub fn full_path(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Whether this is the protected default repository
    pub fn is_default(&self) -> bool {
        self.owner.eq_ignore_ascii_case(DEFAULT_REPO_OWNER)
            && self.name.eq_ignore_ascii_case(DEFAULT_REPO_NAME)
    }
}

/// An access token and the identity it authenticates
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub access_token: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub email: Option<String>,
    pub added_at: i64,
}

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn new(db_path: &Path) -> Result<Self, StoreError> {
        info!("Opening database at {:?}", db_path);

        let conn = Connection::open(db_path)?;

        // Enable WAL mode for better concurrency
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let store = Self {
            conn: Mutex::new(conn),
        };

        store.create_schema()?;
        debug!("Store initialized");

        Ok(store)
    }

    /// Acquire database connection lock with proper error handling
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Get current timestamp in milliseconds since UNIX epoch
    fn current_timestamp_ms() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time before UNIX epoch")
            .as_millis() as i64
    }

    fn create_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock_conn()?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS tracked_repos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner TEXT NOT NULL,
                name TEXT NOT NULL,
                package_id TEXT NOT NULL DEFAULT '',
                display_name TEXT NOT NULL,
                owner_avatar_url TEXT,
                access_token TEXT,
                track_package_ids TEXT NOT NULL DEFAULT '{}',
                UNIQUE(owner COLLATE NOCASE, name COLLATE NOCASE)
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                access_token TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                avatar_url TEXT,
                email TEXT,
                added_at INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        Self::apply_migrations(&conn)?;

        Ok(())
    }

    /// Apply pending migrations based on user_version pragma
    fn apply_migrations(conn: &Connection) -> Result<(), StoreError> {
        let current_version: i32 =
            conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        for (i, statements) in MIGRATIONS.iter().enumerate() {
            let version = (i + 1) as i32;
            if version > current_version {
                for sql in *statements {
                    // Handle "duplicate column name" for databases created
                    // before the migration system
                    match conn.execute(sql, []) {
                        Ok(_) => {}
                        Err(rusqlite::Error::SqliteFailure(_, Some(ref msg)))
                            if msg.contains("duplicate column name") =>
                        {
                            debug!("Column already exists, skipping: {}", sql);
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                debug!("Applied migration v{}", version);
            }
        }

        let target_version = MIGRATIONS.len() as i32;
        if target_version > current_version {
            conn.pragma_update(None, "user_version", target_version)?;
        }

        Ok(())
    }

    fn row_to_repo(row: &Row<'_>) -> rusqlite::Result<TrackedRepository> {
        let raw_mapping: String = row.get(8)?;
        let track_package_ids = serde_json::from_str(&raw_mapping).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(TrackedRepository {
            id: row.get(0)?,
            owner: row.get(1)?,
            name: row.get(2)?,
            package_id: row.get(3)?,
            display_name: row.get(4)?,
            owner_avatar_url: row.get(5)?,
            access_token: row.get(6)?,
            last_checked_version: row.get(7)?,
            track_package_ids,
        })
    }

    const REPO_COLUMNS: &'static str = "id, owner, name, package_id, display_name, \
         owner_avatar_url, access_token, last_checked_version, track_package_ids";

    /// All tracked repositories in stored (insertion) order
    pub fn all_repositories(&self) -> Result<Vec<TrackedRepository>, StoreError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tracked_repos ORDER BY id",
            Self::REPO_COLUMNS
        ))?;

        let repos = stmt
            .query_map([], Self::row_to_repo)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(repos)
    }

    /// Case-insensitive lookup by (owner, name)
    pub fn find_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<TrackedRepository>, StoreError> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            &format!(
                "SELECT {} FROM tracked_repos \
                 WHERE owner = ?1 COLLATE NOCASE AND name = ?2 COLLATE NOCASE",
                Self::REPO_COLUMNS
            ),
            (owner, name),
            Self::row_to_repo,
        );

        match result {
            Ok(repo) => Ok(Some(repo)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Inserts a repository, returning its assigned id. Fails on a
    /// duplicate (owner, name) pair.
    pub fn insert_repository(&self, repo: &TrackedRepository) -> Result<i64, StoreError> {
        let mapping = serde_json::to_string(&repo.track_package_ids)?;
        let conn = self.lock_conn()?;

        conn.execute(
            r#"
            INSERT INTO tracked_repos
                (owner, name, package_id, display_name, owner_avatar_url,
                 access_token, last_checked_version, track_package_ids)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                repo.owner,
                repo.name,
                repo.package_id,
                repo.display_name,
                repo.owner_avatar_url,
                repo.access_token,
                repo.last_checked_version,
                mapping,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    pub fn update_repository(&self, repo: &TrackedRepository) -> Result<(), StoreError> {
        let mapping = serde_json::to_string(&repo.track_package_ids)?;
        let conn = self.lock_conn()?;

        conn.execute(
            r#"
            UPDATE tracked_repos
            SET owner = ?2, name = ?3, package_id = ?4, display_name = ?5,
                owner_avatar_url = ?6, access_token = ?7,
                last_checked_version = ?8, track_package_ids = ?9
            WHERE id = ?1
            "#,
            params![
                repo.id,
                repo.owner,
                repo.name,
                repo.package_id,
                repo.display_name,
                repo.owner_avatar_url,
                repo.access_token,
                repo.last_checked_version,
                mapping,
            ],
        )?;

        Ok(())
    }

    pub fn delete_repository(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.lock_conn()?;
        conn.execute("DELETE FROM tracked_repos WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Updates one (track, package) pair of a repository's mapping,
    /// leaving every other entry untouched. Read-modify-persist inside a
    /// transaction, never a bulk overwrite.
    pub fn set_track_package(
        &self,
        repo_id: i64,
        track_name: &str,
        package_id: &str,
    ) -> Result<(), StoreError> {
        debug!(
            "Mapping track '{}' of repo {} to package '{}'",
            track_name, repo_id, package_id
        );

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let raw: String = tx.query_row(
            "SELECT track_package_ids FROM tracked_repos WHERE id = ?1",
            [repo_id],
            |row| row.get(0),
        )?;
        let mut mapping: IndexMap<String, String> = serde_json::from_str(&raw)?;
        mapping.insert(track_name.to_string(), package_id.to_string());

        tx.execute(
            "UPDATE tracked_repos SET track_package_ids = ?2 WHERE id = ?1",
            params![repo_id, serde_json::to_string(&mapping)?],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Records the advisory last-checked version. Deliberately touches only
    /// that column: a concurrent download may be correcting the package
    /// mapping of the same row, and a whole-row write would erase it.
    pub fn set_last_checked_version(
        &self,
        repo_id: i64,
        version: &str,
    ) -> Result<(), StoreError> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE tracked_repos SET last_checked_version = ?2 WHERE id = ?1",
            params![repo_id, version],
        )?;
        Ok(())
    }

    /// Fills in the global package identifier, but only when it is blank.
    pub fn set_global_package_if_blank(
        &self,
        repo_id: i64,
        package_id: &str,
    ) -> Result<(), StoreError> {
        let conn = self.lock_conn()?;
        let updated = conn.execute(
            "UPDATE tracked_repos SET package_id = ?2 WHERE id = ?1 AND TRIM(package_id) = ''",
            params![repo_id, package_id],
        )?;

        if updated > 0 {
            debug!("Backfilled global package id of repo {}", repo_id);
        }
        Ok(())
    }

    /// All credentials in the order they were added
    pub fn all_credentials(&self) -> Result<Vec<Credential>, StoreError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT access_token, username, avatar_url, email, added_at \
             FROM credentials ORDER BY added_at",
        )?;

        let credentials = stmt
            .query_map([], |row| {
                Ok(Credential {
                    access_token: row.get(0)?,
                    username: row.get(1)?,
                    avatar_url: row.get(2)?,
                    email: row.get(3)?,
                    added_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(credentials)
    }

    /// Inserts or refreshes a credential, keyed by the token itself.
    pub fn insert_credential(
        &self,
        access_token: &str,
        username: &str,
        avatar_url: Option<&str>,
        email: Option<&str>,
    ) -> Result<Credential, StoreError> {
        let added_at = Self::current_timestamp_ms();
        let conn = self.lock_conn()?;

        conn.execute(
            r#"
            INSERT INTO credentials (access_token, username, avatar_url, email, added_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(access_token) DO UPDATE SET
                username = excluded.username,
                avatar_url = excluded.avatar_url,
                email = excluded.email
            "#,
            params![access_token, username, avatar_url, email, added_at],
        )?;

        Ok(Credential {
            access_token: access_token.to_string(),
            username: username.to_string(),
            avatar_url: avatar_url.map(|s| s.to_string()),
            email: email.map(|s| s.to_string()),
            added_at,
        })
    }

    pub fn delete_credential(&self, access_token: &str) -> Result<bool, StoreError> {
        let conn = self.lock_conn()?;
        let deleted = conn.execute(
            "DELETE FROM credentials WHERE access_token = ?1",
            [access_token],
        )?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::new(&dir.path().join("test.db")).unwrap();
        (dir, store)
    }

    fn repo(owner: &str, name: &str) -> TrackedRepository {
        TrackedRepository {
            id: 0,
            owner: owner.to_string(),
            name: name.to_string(),
            package_id: String::new(),
            display_name: name.to_string(),
            owner_avatar_url: None,
            access_token: None,
            last_checked_version: None,
            track_package_ids: IndexMap::new(),
        }
    }

    #[test]
    fn insert_and_list_preserves_stored_order() {
        let (_dir, store) = open_store();

        store.insert_repository(&repo("octo", "first")).unwrap();
        store.insert_repository(&repo("octo", "second")).unwrap();

        let repos = store.all_repositories().unwrap();
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0].name, "first");
        assert_eq!(repos[1].name, "second");
    }

    #[test]
    fn find_repository_is_case_insensitive() {
        let (_dir, store) = open_store();
        store.insert_repository(&repo("Octo", "App")).unwrap();

        let found = store.find_repository("octo", "app").unwrap();
        assert_eq!(found.unwrap().owner, "Octo");
    }

    #[test]
    fn duplicate_owner_name_pair_is_rejected_case_insensitively() {
        let (_dir, store) = open_store();
        store.insert_repository(&repo("octo", "app")).unwrap();

        let result = store.insert_repository(&repo("OCTO", "APP"));
        assert!(matches!(result, Err(StoreError::Database(_))));
    }

    #[test]
    fn set_track_package_updates_only_the_named_pair() {
        let (_dir, store) = open_store();
        let mut r = repo("octo", "app");
        r.track_package_ids
            .insert("Release".to_string(), "com.stable".to_string());
        let id = store.insert_repository(&r).unwrap();

        store
            .set_track_package(id, "Pre-Release", "com.beta")
            .unwrap();

        let saved = store.find_repository("octo", "app").unwrap().unwrap();
        assert_eq!(
            saved.track_package_ids.get("Release").map(String::as_str),
            Some("com.stable")
        );
        assert_eq!(
            saved
                .track_package_ids
                .get("Pre-Release")
                .map(String::as_str),
            Some("com.beta")
        );
    }

    #[test]
    fn set_last_checked_version_touches_only_that_column() {
        let (_dir, store) = open_store();
        let mut r = repo("octo", "app");
        r.package_id = "com.x".to_string();
        let id = store.insert_repository(&r).unwrap();
        store.set_track_package(id, "Release", "com.y").unwrap();

        store.set_last_checked_version(id, "2.0").unwrap();

        let saved = store.find_repository("octo", "app").unwrap().unwrap();
        assert_eq!(saved.last_checked_version.as_deref(), Some("2.0"));
        assert_eq!(saved.package_id, "com.x");
        assert_eq!(
            saved.track_package_ids.get("Release").map(String::as_str),
            Some("com.y")
        );
    }

    #[test]
    fn set_global_package_only_fills_blank_values() {
        let (_dir, store) = open_store();
        let id = store.insert_repository(&repo("octo", "app")).unwrap();

        store.set_global_package_if_blank(id, "com.first").unwrap();
        store.set_global_package_if_blank(id, "com.second").unwrap();

        let saved = store.find_repository("octo", "app").unwrap().unwrap();
        assert_eq!(saved.package_id, "com.first");
    }

    #[test]
    fn update_repository_round_trips_the_track_mapping() {
        let (_dir, store) = open_store();
        let mut r = repo("octo", "app");
        r.id = store.insert_repository(&r).unwrap();
        r.track_package_ids
            .insert("Release".to_string(), "com.x".to_string());
        r.access_token = Some("ghp_secret".to_string());

        store.update_repository(&r).unwrap();

        let saved = store.find_repository("octo", "app").unwrap().unwrap();
        assert_eq!(saved.track_package_ids, r.track_package_ids);
        assert_eq!(saved.access_token.as_deref(), Some("ghp_secret"));
    }

    #[test]
    fn delete_repository_removes_the_row() {
        let (_dir, store) = open_store();
        let id = store.insert_repository(&repo("octo", "app")).unwrap();

        store.delete_repository(id).unwrap();

        assert!(store.all_repositories().unwrap().is_empty());
    }

    #[test]
    fn credentials_are_listed_in_added_order() {
        let (_dir, store) = open_store();
        store
            .insert_credential("ghp_one", "alice", None, None)
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        store
            .insert_credential("ghp_two", "bob", Some("https://a"), Some("b@x"))
            .unwrap();

        let credentials = store.all_credentials().unwrap();
        assert_eq!(credentials.len(), 2);
        assert_eq!(credentials[0].username, "alice");
        assert_eq!(credentials[1].username, "bob");
    }

    #[test]
    fn reinserting_a_credential_refreshes_identity_fields() {
        let (_dir, store) = open_store();
        store
            .insert_credential("ghp_one", "alice", None, None)
            .unwrap();
        store
            .insert_credential("ghp_one", "alice-renamed", None, None)
            .unwrap();

        let credentials = store.all_credentials().unwrap();
        assert_eq!(credentials.len(), 1);
        assert_eq!(credentials[0].username, "alice-renamed");
    }

    #[test]
    fn delete_credential_reports_whether_it_existed() {
        let (_dir, store) = open_store();
        store
            .insert_credential("ghp_one", "alice", None, None)
            .unwrap();

        assert!(store.delete_credential("ghp_one").unwrap());
        assert!(!store.delete_credential("ghp_one").unwrap());
    }

    #[test]
    fn is_default_matches_case_insensitively() {
        let mut r = repo("AKASHSARKAR188", "gitrelease");
        assert!(r.is_default());
        r.name = "other".to_string();
        assert!(!r.is_default());
    }

    #[test]
    fn reopening_the_store_applies_migrations_idempotently() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");

        {
            let store = Store::new(&path).unwrap();
            store.insert_repository(&repo("octo", "app")).unwrap();
        }

        let store = Store::new(&path).unwrap();
        assert_eq!(store.all_repositories().unwrap().len(), 1);
    }
}
