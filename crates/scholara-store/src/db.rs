//! SQLite schema and queries for the metadata store.

use rusqlite::{Connection, OptionalExtension, Row, params};

use scholara_core::{
    Contributor, NewResource, NewUser, RatingSummary, Resource, ResourceSummary, Role, Subject,
    User, word_count,
};

use crate::StoreError;

pub const SCHEMA_VERSION: &str = "2";

/// Initialize the database with the required schema.
pub fn init_database(conn: &Connection) -> Result<(), StoreError> {
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS subjects (
            id INTEGER PRIMARY KEY,
            value TEXT UNIQUE NOT NULL,
            label TEXT NOT NULL,
            category TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT,
            email TEXT UNIQUE NOT NULL,
            profile_picture TEXT,
            role TEXT NOT NULL DEFAULT 'user',
            token TEXT UNIQUE NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS resources (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            subject TEXT NOT NULL REFERENCES subjects(value),
            file_name TEXT NOT NULL,
            mime_type TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            text TEXT NOT NULL,
            word_count INTEGER NOT NULL,
            -- Lowercased title, description and text for `q` filtering
            search_text TEXT NOT NULL DEFAULT '',
            uploader_id TEXT NOT NULL REFERENCES users(id),
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ratings (
            resource_id TEXT NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id),
            rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
            PRIMARY KEY (resource_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS metadata (
            key TEXT PRIMARY KEY,
            value TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_resources_subject ON resources(subject);
        CREATE INDEX IF NOT EXISTS idx_resources_uploader ON resources(uploader_id);
        "#,
    )?;

    backfill_search_text(conn)?;
    set_metadata(conn, "schema_version", SCHEMA_VERSION)?;
    Ok(())
}

/// Add and fill `resources.search_text` in databases created before it existed.
fn backfill_search_text(conn: &Connection) -> Result<(), StoreError> {
    let has_column: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM pragma_table_info('resources') WHERE name = 'search_text'",
        [],
        |row| row.get(0),
    )?;
    if has_column {
        return Ok(());
    }

    conn.execute(
        "ALTER TABLE resources ADD COLUMN search_text TEXT NOT NULL DEFAULT ''",
        [],
    )?;
    let rows = {
        let mut stmt = conn.prepare("SELECT id, title, description, text FROM resources")?;
        stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let title: String = row.get(1)?;
            let description: Option<String> = row.get(2)?;
            let text: String = row.get(3)?;
            Ok((id, search_text(&title, description.as_deref(), &text)))
        })?
        .collect::<Result<Vec<_>, _>>()?
    };
    let mut update = conn.prepare("UPDATE resources SET search_text = ?2 WHERE id = ?1")?;
    for (id, text) in &rows {
        update.execute(params![id, text])?;
    }
    tracing::info!(resources = rows.len(), "backfilled resource search text");
    Ok(())
}

/// Case-folded haystack for resource search.
///
/// SQLite's `LIKE` folds ASCII only, so folding happens here for both the
/// stored text and the query.
fn search_text(title: &str, description: Option<&str>, text: &str) -> String {
    let mut haystack = String::with_capacity(title.len() + text.len() + 2);
    haystack.push_str(title);
    haystack.push('\n');
    haystack.push_str(description.unwrap_or(""));
    haystack.push('\n');
    haystack.push_str(text);
    haystack.to_lowercase()
}

/// Get a metadata value by key.
pub fn get_metadata(conn: &Connection, key: &str) -> Result<Option<String>, StoreError> {
    let mut stmt = conn.prepare_cached("SELECT value FROM metadata WHERE key = ?1")?;
    Ok(stmt.query_row(params![key], |row| row.get(0)).optional()?)
}

/// Set a metadata value (upsert).
pub fn set_metadata(conn: &Connection, key: &str, value: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO metadata (key, value) VALUES (?1, ?2) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    err.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation)
}

// ── Subjects ────────────────────────────────────────────────────────────

pub fn insert_subject(conn: &Connection, subject: &Subject) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO subjects (value, label, category) VALUES (?1, ?2, ?3)",
        params![subject.value, subject.label, subject.category],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            StoreError::DuplicateSubject(subject.value.clone())
        } else {
            StoreError::Database(e)
        }
    })?;
    Ok(())
}

/// Insert subjects, skipping values that already exist. Returns how many
/// were inserted.
pub fn seed_subjects(conn: &Connection, subjects: &[Subject]) -> Result<usize, StoreError> {
    let tx = conn.unchecked_transaction()?;
    let mut inserted = 0;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT OR IGNORE INTO subjects (value, label, category) VALUES (?1, ?2, ?3)",
        )?;
        for subject in subjects {
            inserted += stmt.execute(params![subject.value, subject.label, subject.category])?;
        }
    }
    tx.commit()?;
    Ok(inserted)
}

pub fn list_subjects(conn: &Connection) -> Result<Vec<Subject>, StoreError> {
    let mut stmt = conn.prepare_cached("SELECT value, label, category FROM subjects ORDER BY id")?;
    let subjects = stmt
        .query_map([], |row| {
            Ok(Subject {
                value: row.get(0)?,
                label: row.get(1)?,
                category: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(subjects)
}

pub fn subject_exists(conn: &Connection, value: &str) -> Result<bool, StoreError> {
    let exists = conn.query_row(
        "SELECT COUNT(*) > 0 FROM subjects WHERE value = ?1",
        params![value],
        |row| row.get(0),
    )?;
    Ok(exists)
}

// ── Users ───────────────────────────────────────────────────────────────

const USER_COLUMNS: &str = "id, name, email, profile_picture, role, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(4)?;
    let role = role.parse::<Role>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        profile_picture: row.get(3)?,
        role,
        created_at: row.get::<_, i64>(5)? as u64,
    })
}

pub fn insert_user(
    conn: &Connection,
    id: &str,
    token: &str,
    user: &NewUser,
    created_at: u64,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO users (id, name, email, profile_picture, role, token, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            user.name,
            user.email,
            user.profile_picture,
            user.role.as_str(),
            token,
            created_at as i64
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            StoreError::DuplicateEmail(user.email.clone())
        } else {
            StoreError::Database(e)
        }
    })?;
    Ok(())
}

pub fn user_by_id(conn: &Connection, id: &str) -> Result<Option<User>, StoreError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let mut stmt = conn.prepare_cached(&sql)?;
    Ok(stmt.query_row(params![id], user_from_row).optional()?)
}

pub fn user_by_token(conn: &Connection, token: &str) -> Result<Option<User>, StoreError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE token = ?1");
    let mut stmt = conn.prepare_cached(&sql)?;
    Ok(stmt.query_row(params![token], user_from_row).optional()?)
}

/// Look up a user by e-mail, returning the user and their token.
pub fn user_by_email(conn: &Connection, email: &str) -> Result<Option<(User, String)>, StoreError> {
    let sql = format!("SELECT {USER_COLUMNS}, token FROM users WHERE email = ?1");
    let mut stmt = conn.prepare_cached(&sql)?;
    let found = stmt
        .query_row(params![email], |row| {
            Ok((user_from_row(row)?, row.get::<_, String>(6)?))
        })
        .optional()?;
    Ok(found)
}

pub fn admin_exists(conn: &Connection) -> Result<bool, StoreError> {
    let exists = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE role = 'admin'",
        [],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn set_role(conn: &Connection, user_id: &str, role: Role) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE users SET role = ?1 WHERE id = ?2",
        params![role.as_str(), user_id],
    )?;
    Ok(())
}

// ── Contributions ───────────────────────────────────────────────────────

pub fn contribution_count(conn: &Connection, user_id: &str) -> Result<u64, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM resources WHERE uploader_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// Users with at least one uploaded resource, most prolific first.
pub fn contributors(conn: &Connection) -> Result<Vec<Contributor>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT u.id, u.name, u.email, u.profile_picture, COUNT(r.id) AS n \
         FROM users u JOIN resources r ON r.uploader_id = u.id \
         GROUP BY u.id \
         ORDER BY n DESC, u.id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Contributor {
                user_id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                profile_picture: row.get(3)?,
                contribution_count: row.get::<_, i64>(4)? as u64,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Resources ───────────────────────────────────────────────────────────

pub fn insert_resource(
    conn: &Connection,
    id: &str,
    resource: &NewResource,
    created_at: u64,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO resources (id, title, description, subject, file_name, mime_type, \
         size_bytes, text, word_count, search_text, uploader_id, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            id,
            resource.title,
            resource.description,
            resource.subject,
            resource.file_name,
            resource.mime_type,
            resource.size_bytes as i64,
            resource.text,
            word_count(&resource.text) as i64,
            search_text(
                &resource.title,
                resource.description.as_deref(),
                &resource.text
            ),
            resource.uploader_id,
            created_at as i64
        ],
    )?;
    Ok(())
}

pub fn get_resource(conn: &Connection, id: &str) -> Result<Option<Resource>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, title, description, subject, file_name, mime_type, size_bytes, text, \
         uploader_id, created_at FROM resources WHERE id = ?1",
    )?;
    let resource = stmt
        .query_row(params![id], |row| {
            Ok(Resource {
                id: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                subject: row.get(3)?,
                file_name: row.get(4)?,
                mime_type: row.get(5)?,
                size_bytes: row.get::<_, i64>(6)? as u64,
                text: row.get(7)?,
                uploader_id: row.get(8)?,
                created_at: row.get::<_, i64>(9)? as u64,
            })
        })
        .optional()?;
    Ok(resource)
}

/// Escape `%`, `_` and `\` for a LIKE pattern and wrap in wildcards.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub fn list_resources(
    conn: &Connection,
    subject: Option<&str>,
    query: Option<&str>,
) -> Result<Vec<ResourceSummary>, StoreError> {
    let pattern = query.map(|q| like_pattern(&q.to_lowercase()));
    let mut stmt = conn.prepare_cached(
        r#"
        SELECT res.id, res.title, res.description, res.subject, res.file_name, res.mime_type,
               res.size_bytes, res.word_count, res.uploader_id, res.created_at,
               AVG(r.rating), COUNT(r.rating)
        FROM resources res
        LEFT JOIN ratings r ON r.resource_id = res.id
        WHERE (?1 IS NULL OR res.subject = ?1)
          AND (?2 IS NULL OR res.search_text LIKE ?2 ESCAPE '\')
        GROUP BY res.id
        ORDER BY res.created_at DESC, res.rowid DESC
        "#,
    )?;
    let rows = stmt
        .query_map(params![subject, pattern], |row| {
            Ok(ResourceSummary {
                id: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                subject: row.get(3)?,
                file_name: row.get(4)?,
                mime_type: row.get(5)?,
                size_bytes: row.get::<_, i64>(6)? as u64,
                word_count: row.get::<_, i64>(7)? as usize,
                uploader_id: row.get(8)?,
                created_at: row.get::<_, i64>(9)? as u64,
                average_rating: row.get(10)?,
                rating_count: row.get::<_, i64>(11)? as u64,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn resource_exists(conn: &Connection, id: &str) -> Result<bool, StoreError> {
    let exists = conn.query_row(
        "SELECT COUNT(*) > 0 FROM resources WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Insert or replace a user's rating for a resource.
pub fn upsert_rating(
    conn: &Connection,
    resource_id: &str,
    user_id: &str,
    rating: u8,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO ratings (resource_id, user_id, rating) VALUES (?1, ?2, ?3) \
         ON CONFLICT(resource_id, user_id) DO UPDATE SET rating = excluded.rating",
        params![resource_id, user_id, rating as i64],
    )?;
    Ok(())
}

pub fn rating_summary(conn: &Connection, resource_id: &str) -> Result<RatingSummary, StoreError> {
    let summary = conn.query_row(
        "SELECT AVG(rating), COUNT(rating) FROM ratings WHERE resource_id = ?1",
        params![resource_id],
        |row| {
            Ok(RatingSummary {
                average_rating: row.get(0)?,
                rating_count: row.get::<_, i64>(1)? as u64,
            })
        },
    )?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_database(&conn).unwrap();
        conn
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: None,
            email: email.into(),
            profile_picture: None,
            role: Role::User,
        }
    }

    #[test]
    fn test_init_records_schema_version() {
        let conn = setup_db();
        assert_eq!(
            get_metadata(&conn, "schema_version").unwrap().as_deref(),
            Some(SCHEMA_VERSION)
        );
        // Idempotent
        init_database(&conn).unwrap();
    }

    #[test]
    fn test_duplicate_subject_value_rejected() {
        let conn = setup_db();
        insert_subject(&conn, &Subject::new("math", "Mathematics", "STEM")).unwrap();
        let err = insert_subject(&conn, &Subject::new("math", "Maths", "Other")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateSubject(v) if v == "math"));
        assert_eq!(list_subjects(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_seed_skips_existing() {
        let conn = setup_db();
        insert_subject(&conn, &Subject::new("bio", "Biology", "STEM")).unwrap();
        let inserted = seed_subjects(
            &conn,
            &[
                Subject::new("bio", "Biology", "STEM"),
                Subject::new("hist", "History", "Humanities"),
            ],
        )
        .unwrap();
        assert_eq!(inserted, 1);
        let values: Vec<_> = list_subjects(&conn)
            .unwrap()
            .into_iter()
            .map(|s| s.value)
            .collect();
        assert_eq!(values, vec!["bio", "hist"]);
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let conn = setup_db();
        insert_user(&conn, "u1", "t1", &new_user("a@x.io"), 1).unwrap();
        let err = insert_user(&conn, "u2", "t2", &new_user("a@x.io"), 2).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail(_)));
    }

    #[test]
    fn test_user_lookup_by_token_and_email() {
        let conn = setup_db();
        insert_user(&conn, "u1", "secret", &new_user("a@x.io"), 1).unwrap();
        assert_eq!(user_by_token(&conn, "secret").unwrap().unwrap().id, "u1");
        assert!(user_by_token(&conn, "nope").unwrap().is_none());
        let (user, token) = user_by_email(&conn, "a@x.io").unwrap().unwrap();
        assert_eq!(user.role, Role::User);
        assert_eq!(token, "secret");
    }

    fn new_resource(title: &str, description: Option<&str>, text: &str) -> NewResource {
        NewResource {
            title: title.into(),
            description: description.map(str::to_string),
            subject: "econ".into(),
            file_name: "notes.txt".into(),
            mime_type: "text/plain".into(),
            size_bytes: text.len() as u64,
            text: text.into(),
            uploader_id: "u1".into(),
        }
    }

    fn search(conn: &Connection, query: &str) -> Vec<String> {
        list_resources(conn, None, Some(query))
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect()
    }

    #[test]
    fn test_search_folds_non_ascii_case() {
        let conn = setup_db();
        insert_subject(&conn, &Subject::new("econ", "Economics", "Social")).unwrap();
        insert_user(&conn, "u1", "t1", &new_user("a@x.io"), 1).unwrap();
        insert_resource(&conn, "r1", &new_resource("Ökonomie", None, "Grundlagen"), 1).unwrap();
        insert_resource(
            &conn,
            "r2",
            &new_resource("Week 2", Some("ÉTUDE DE CAS"), "Markets"),
            2,
        )
        .unwrap();

        assert_eq!(search(&conn, "ÖKONOMIE"), vec!["Ökonomie"]);
        assert_eq!(search(&conn, "ökonomie"), vec!["Ökonomie"]);
        assert_eq!(search(&conn, "étude"), vec!["Week 2"]);
        assert_eq!(search(&conn, "MARKETS"), vec!["Week 2"]);
        assert!(search(&conn, "50%").is_empty());
    }

    #[test]
    fn test_search_text_backfilled_for_older_databases() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE resources (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                subject TEXT NOT NULL,
                file_name TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                text TEXT NOT NULL,
                word_count INTEGER NOT NULL,
                uploader_id TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            INSERT INTO resources VALUES
                ('r1', 'Ökonomie', NULL, 'econ', 'a.txt', 'text/plain', 1, 'x', 1, 'u1', 1);
            "#,
        )
        .unwrap();

        init_database(&conn).unwrap();
        assert_eq!(search(&conn, "ÖKONOMIE"), vec!["Ökonomie"]);
        // Second open finds the column and leaves it alone
        init_database(&conn).unwrap();
        assert_eq!(search(&conn, "ökonomie"), vec!["Ökonomie"]);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
