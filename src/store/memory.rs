use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use axum::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{DuplicateEmail, NoteRepo, SessionRepo, UserRepo};
use crate::models::{NewNote, NewUser, Note, NoteChanges, Role, Session, User};
use crate::notes::query::{newest_first, NoteFilter, Window};

/// Process-local store backing tests and `AppState::fake()`.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    notes: Vec<Note>,
    sessions: Vec<Session>,
    last_note_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let inner = self.lock()?;
        let wanted = email.to_lowercase();
        Ok(inner
            .users
            .iter()
            .find(|u| u.email.to_lowercase() == wanted)
            .cloned())
    }

    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let inner = self.lock()?;
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> anyhow::Result<Vec<User>> {
        let inner = self.lock()?;
        Ok(inner
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn list_users_with_role(&self, role: Role) -> anyhow::Result<Vec<User>> {
        let inner = self.lock()?;
        let mut users: Vec<User> = inner
            .users
            .iter()
            .filter(|u| u.role == role)
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn create_user(&self, new: NewUser) -> anyhow::Result<User> {
        let mut inner = self.lock()?;
        let wanted = new.email.to_lowercase();
        if inner.users.iter().any(|u| u.email.to_lowercase() == wanted) {
            return Err(DuplicateEmail.into());
        }
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> anyhow::Result<Option<User>> {
        let mut inner = self.lock()?;
        Ok(inner.users.iter_mut().find(|u| u.id == id).map(|u| {
            u.role = role;
            u.clone()
        }))
    }

    async fn delete_user_cascade(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut inner = self.lock()?;
        if !inner.users.iter().any(|u| u.id == id) {
            return Ok(false);
        }
        inner.notes.retain(|n| n.user_id != id);
        inner.sessions.retain(|s| s.user_id != id);
        inner.users.retain(|u| u.id != id);
        Ok(true)
    }
}

#[async_trait]
impl NoteRepo for MemoryStore {
    async fn insert_note(&self, new: NewNote) -> anyhow::Result<Note> {
        let mut inner = self.lock()?;
        anyhow::ensure!(
            inner.users.iter().any(|u| u.id == new.user_id),
            "note owner {} does not exist",
            new.user_id
        );
        inner.last_note_id += 1;
        let note = Note {
            id: inner.last_note_id,
            title: new.title,
            subject: new.subject,
            content: new.content,
            created_at: new.created_at,
            user_id: new.user_id,
        };
        inner.notes.push(note.clone());
        Ok(note)
    }

    async fn find_note(&self, id: i64) -> anyhow::Result<Option<Note>> {
        let inner = self.lock()?;
        Ok(inner.notes.iter().find(|n| n.id == id).cloned())
    }

    async fn update_note(
        &self,
        id: i64,
        owner: Uuid,
        changes: NoteChanges,
    ) -> anyhow::Result<Option<Note>> {
        let mut inner = self.lock()?;
        Ok(inner
            .notes
            .iter_mut()
            .find(|n| n.id == id && n.user_id == owner)
            .map(|n| {
                n.title = changes.title;
                n.content = changes.content;
                if let Some(subject) = changes.subject {
                    n.subject = subject;
                }
                n.clone()
            }))
    }

    async fn delete_note(&self, id: i64, owner: Uuid) -> anyhow::Result<Option<Note>> {
        let mut inner = self.lock()?;
        let pos = inner
            .notes
            .iter()
            .position(|n| n.id == id && n.user_id == owner);
        Ok(pos.map(|i| inner.notes.remove(i)))
    }

    async fn find_notes(
        &self,
        filter: &NoteFilter,
        window: Option<Window>,
    ) -> anyhow::Result<Vec<Note>> {
        let inner = self.lock()?;
        let mut notes: Vec<Note> = inner
            .notes
            .iter()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect();
        notes.sort_by(newest_first);
        Ok(match window {
            Some(w) => notes
                .into_iter()
                .skip(usize::try_from(w.offset).unwrap_or(usize::MAX))
                .take(usize::try_from(w.limit).unwrap_or(0))
                .collect(),
            None => notes,
        })
    }

    async fn count_notes(&self, filter: &NoteFilter) -> anyhow::Result<i64> {
        let inner = self.lock()?;
        Ok(inner.notes.iter().filter(|n| filter.matches(n)).count() as i64)
    }

    async fn notes_by_owners(&self, owners: &[Uuid]) -> anyhow::Result<Vec<Note>> {
        let inner = self.lock()?;
        let mut notes: Vec<Note> = inner
            .notes
            .iter()
            .filter(|n| owners.contains(&n.user_id))
            .cloned()
            .collect();
        notes.sort_by(newest_first);
        Ok(notes)
    }

    async fn count_notes_created_between(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> anyhow::Result<i64> {
        let inner = self.lock()?;
        Ok(inner
            .notes
            .iter()
            .filter(|n| n.created_at >= start && n.created_at < end)
            .count() as i64)
    }

    async fn top_note_owners(&self, limit: i64) -> anyhow::Result<Vec<(Uuid, i64)>> {
        let inner = self.lock()?;
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for note in &inner.notes {
            *counts.entry(note.user_id).or_default() += 1;
        }
        let mut ranked: Vec<(Uuid, i64)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(ranked)
    }
}

#[async_trait]
impl SessionRepo for MemoryStore {
    async fn insert_session(
        &self,
        user_id: Uuid,
        expires: OffsetDateTime,
    ) -> anyhow::Result<Session> {
        let mut inner = self.lock()?;
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            expires,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.sessions.push(session.clone());
        Ok(session)
    }

    async fn count_sessions_expiring_between(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> anyhow::Result<i64> {
        let inner = self.lock()?;
        Ok(inner
            .sessions
            .iter()
            .filter(|s| s.expires >= start && s.expires < end)
            .count() as i64)
    }
}
