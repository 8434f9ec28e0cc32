//! Durable storage seam. Services talk to `dyn Store`; production uses
//! [`PgStore`], tests and `AppState::fake()` use [`MemoryStore`].

use axum::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::{NewNote, NewUser, Note, NoteChanges, Role, Session, User};
use crate::notes::query::{NoteFilter, Window};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Returned by [`UserRepo::create_user`] when the email is taken, even if a
/// prior lookup said it was free.
#[derive(Debug, thiserror::Error)]
#[error("email already registered")]
pub struct DuplicateEmail;

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Case-insensitive email lookup.
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_users(&self, ids: &[Uuid]) -> anyhow::Result<Vec<User>>;
    /// Users with `role`, newest account first.
    async fn list_users_with_role(&self, role: Role) -> anyhow::Result<Vec<User>>;
    async fn create_user(&self, new: NewUser) -> anyhow::Result<User>;
    async fn set_user_role(&self, id: Uuid, role: Role) -> anyhow::Result<Option<User>>;
    /// Removes the user's notes, sessions and the user row in one unit.
    /// Returns false when no such user exists.
    async fn delete_user_cascade(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait NoteRepo: Send + Sync {
    async fn insert_note(&self, new: NewNote) -> anyhow::Result<Note>;
    async fn find_note(&self, id: i64) -> anyhow::Result<Option<Note>>;
    /// Applies `changes` only if the note is still owned by `owner`.
    async fn update_note(
        &self,
        id: i64,
        owner: Uuid,
        changes: NoteChanges,
    ) -> anyhow::Result<Option<Note>>;
    /// Deletes only if the note is still owned by `owner`.
    async fn delete_note(&self, id: i64, owner: Uuid) -> anyhow::Result<Option<Note>>;
    /// Matching notes in listing order, optionally sliced.
    async fn find_notes(
        &self,
        filter: &NoteFilter,
        window: Option<Window>,
    ) -> anyhow::Result<Vec<Note>>;
    async fn count_notes(&self, filter: &NoteFilter) -> anyhow::Result<i64>;
    async fn notes_by_owners(&self, owners: &[Uuid]) -> anyhow::Result<Vec<Note>>;
    /// Notes with `start <= created_at < end`, across all owners.
    async fn count_notes_created_between(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> anyhow::Result<i64>;
    /// `(owner, note count)` by count descending, ties by owner id.
    async fn top_note_owners(&self, limit: i64) -> anyhow::Result<Vec<(Uuid, i64)>>;
}

#[async_trait]
pub trait SessionRepo: Send + Sync {
    async fn insert_session(
        &self,
        user_id: Uuid,
        expires: OffsetDateTime,
    ) -> anyhow::Result<Session>;
    /// Sessions with `start <= expires < end`.
    async fn count_sessions_expiring_between(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> anyhow::Result<i64>;
}

pub trait Store: UserRepo + NoteRepo + SessionRepo {}

impl<T: UserRepo + NoteRepo + SessionRepo> Store for T {}
