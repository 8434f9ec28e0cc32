use anyhow::Context;
use axum::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{DuplicateEmail, NoteRepo, SessionRepo, UserRepo};
use crate::models::{NewNote, NewUser, Note, NoteChanges, Role, Session, User, UserRow};
use crate::notes::query::{NoteFilter, Window};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at";
const NOTE_COLUMNS: &str = "id, title, subject, content, created_at, user_id";

// strpos keeps user input literal; LIKE would treat % and _ as wildcards.
const NOTE_FILTER: &str = r#"
    user_id = $1
    AND ($2 = '' OR strpos(lower(title), lower($2)) > 0 OR strpos(lower(content), lower($2)) > 0)
    AND ($3 = '' OR strpos(lower(subject), lower($3)) > 0)
"#;

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

fn into_users(rows: Vec<UserRow>) -> anyhow::Result<Vec<User>> {
    rows.into_iter().map(User::try_from).collect()
}

#[async_trait]
impl UserRepo for PgStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        row.map(User::try_from).transpose()
    }

    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user")?;
        row.map(User::try_from).transpose()
    }

    async fn find_users(&self, ids: &[Uuid]) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.db)
        .await
        .context("find users by id")?;
        into_users(rows)
    }

    async fn list_users_with_role(&self, role: Role) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = $1 ORDER BY created_at DESC"
        ))
        .bind(role.as_str())
        .fetch_all(&self.db)
        .await
        .context("list users by role")?;
        into_users(rows)
    }

    async fn create_user(&self, new: NewUser) -> anyhow::Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new.name)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.role.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return anyhow::Error::new(DuplicateEmail);
                }
            }
            anyhow::Error::new(e).context("insert user")
        })?;
        User::try_from(row)
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(&self.db)
        .await
        .context("update user role")?;
        row.map(User::try_from).transpose()
    }

    async fn delete_user_cascade(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        sqlx::query("DELETE FROM notes WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete user notes")?;
        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete user sessions")?;
        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete user")?
            .rows_affected();
        tx.commit().await.context("commit tx")?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl NoteRepo for PgStore {
    async fn insert_note(&self, new: NewNote) -> anyhow::Result<Note> {
        let note = sqlx::query_as::<_, Note>(&format!(
            r#"
            INSERT INTO notes (title, subject, content, created_at, user_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {NOTE_COLUMNS}
            "#
        ))
        .bind(new.title)
        .bind(new.subject)
        .bind(new.content)
        .bind(new.created_at)
        .bind(new.user_id)
        .fetch_one(&self.db)
        .await
        .context("insert note")?;
        Ok(note)
    }

    async fn find_note(&self, id: i64) -> anyhow::Result<Option<Note>> {
        let note = sqlx::query_as::<_, Note>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find note")?;
        Ok(note)
    }

    async fn update_note(
        &self,
        id: i64,
        owner: Uuid,
        changes: NoteChanges,
    ) -> anyhow::Result<Option<Note>> {
        let note = sqlx::query_as::<_, Note>(&format!(
            r#"
            UPDATE notes
               SET title = $3, content = $4, subject = COALESCE($5, subject)
             WHERE id = $1 AND user_id = $2
            RETURNING {NOTE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(owner)
        .bind(changes.title)
        .bind(changes.content)
        .bind(changes.subject)
        .fetch_optional(&self.db)
        .await
        .context("update note")?;
        Ok(note)
    }

    async fn delete_note(&self, id: i64, owner: Uuid) -> anyhow::Result<Option<Note>> {
        let note = sqlx::query_as::<_, Note>(&format!(
            "DELETE FROM notes WHERE id = $1 AND user_id = $2 RETURNING {NOTE_COLUMNS}"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await
        .context("delete note")?;
        Ok(note)
    }

    async fn find_notes(
        &self,
        filter: &NoteFilter,
        window: Option<Window>,
    ) -> anyhow::Result<Vec<Note>> {
        // LIMIT NULL means no limit
        let (limit, offset) = match window {
            Some(w) => (Some(w.limit), w.offset),
            None => (None, 0),
        };
        let notes = sqlx::query_as::<_, Note>(&format!(
            r#"
            SELECT {NOTE_COLUMNS}
              FROM notes
             WHERE {NOTE_FILTER}
             ORDER BY created_at DESC, id ASC
             LIMIT $4 OFFSET $5
            "#
        ))
        .bind(filter.owner)
        .bind(filter.search.as_str())
        .bind(filter.subject.as_str())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .context("find notes")?;
        Ok(notes)
    }

    async fn count_notes(&self, filter: &NoteFilter) -> anyhow::Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM notes WHERE {NOTE_FILTER}"
        ))
        .bind(filter.owner)
        .bind(filter.search.as_str())
        .bind(filter.subject.as_str())
        .fetch_one(&self.db)
        .await
        .context("count notes")?;
        Ok(count)
    }

    async fn notes_by_owners(&self, owners: &[Uuid]) -> anyhow::Result<Vec<Note>> {
        let notes = sqlx::query_as::<_, Note>(&format!(
            r#"
            SELECT {NOTE_COLUMNS}
              FROM notes
             WHERE user_id = ANY($1)
             ORDER BY created_at DESC, id ASC
            "#
        ))
        .bind(owners)
        .fetch_all(&self.db)
        .await
        .context("notes by owners")?;
        Ok(notes)
    }

    async fn count_notes_created_between(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> anyhow::Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notes WHERE created_at >= $1 AND created_at < $2",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.db)
        .await
        .context("count notes in range")?;
        Ok(count)
    }

    async fn top_note_owners(&self, limit: i64) -> anyhow::Result<Vec<(Uuid, i64)>> {
        let rows = sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            SELECT user_id, COUNT(*) AS note_count
              FROM notes
             GROUP BY user_id
             ORDER BY note_count DESC, user_id ASC
             LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .context("top note owners")?;
        Ok(rows)
    }
}

#[async_trait]
impl SessionRepo for PgStore {
    async fn insert_session(
        &self,
        user_id: Uuid,
        expires: OffsetDateTime,
    ) -> anyhow::Result<Session> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, user_id, expires)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, expires, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(expires)
        .fetch_one(&self.db)
        .await
        .context("insert session")?;
        Ok(session)
    }

    async fn count_sessions_expiring_between(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> anyhow::Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sessions WHERE expires >= $1 AND expires < $2",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.db)
        .await
        .context("count sessions in range")?;
        Ok(count)
    }
}
