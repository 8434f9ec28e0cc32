use time::OffsetDateTime;
use tracing::{info, warn};

use super::query::{NoteFilter, NotePage, PageRequest};
use crate::{
    auth::Principal,
    error::{AppError, AppResult},
    models::{NewNote, Note, NoteChanges},
    store::{NoteRepo, Store},
};

fn required(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(())
}

/// Loads a note and checks it belongs to the caller.
async fn owned_note(store: &dyn Store, id: i64, caller: &Principal) -> AppResult<Note> {
    let note = store.find_note(id).await?.ok_or(AppError::NotFound)?;
    if note.user_id != caller.user_id {
        warn!(note_id = id, user_id = %caller.user_id, "note owned by another user");
        return Err(AppError::Forbidden);
    }
    Ok(note)
}

pub async fn list_notes(
    store: &dyn Store,
    caller: &Principal,
    page: Option<i64>,
    search: Option<&str>,
    subject: Option<&str>,
) -> AppResult<NotePage> {
    let filter = NoteFilter::new(caller.user_id, search, subject);
    let page = PageRequest::new(page);

    let total = store.count_notes(&filter).await?;
    let notes = store.find_notes(&filter, Some(page.window())).await?;

    Ok(NotePage {
        notes,
        current_page: page.page,
        total_pages: page.total_pages(total),
    })
}

/// Every title/content match for `query`, unpaginated. Blank query finds nothing.
pub async fn search_all(store: &dyn Store, caller: &Principal, query: &str) -> AppResult<Vec<Note>> {
    let filter = NoteFilter::new(caller.user_id, Some(query), None);
    if filter.search.is_empty() {
        return Ok(Vec::new());
    }
    Ok(store.find_notes(&filter, None).await?)
}

pub async fn get_note(store: &dyn Store, caller: &Principal, id: i64) -> AppResult<Note> {
    owned_note(store, id, caller).await
}

pub async fn create_note(
    store: &dyn Store,
    caller: &Principal,
    title: &str,
    subject: &str,
    content: &str,
) -> AppResult<Note> {
    required("Title", title)?;
    required("Subject", subject)?;
    required("Content", content)?;

    let note = store
        .insert_note(NewNote {
            user_id: caller.user_id,
            title: title.trim().to_string(),
            subject: subject.trim().to_string(),
            content: content.to_string(),
            created_at: OffsetDateTime::now_utc(),
        })
        .await?;

    info!(note_id = note.id, user_id = %caller.user_id, "note created");
    Ok(note)
}

pub async fn update_note(
    store: &dyn Store,
    caller: &Principal,
    id: i64,
    title: &str,
    content: &str,
    subject: Option<&str>,
) -> AppResult<Note> {
    owned_note(store, id, caller).await?;

    required("Title", title)?;
    required("Content", content)?;
    if let Some(subject) = subject {
        required("Subject", subject)?;
    }

    let changes = NoteChanges {
        title: title.trim().to_string(),
        content: content.to_string(),
        subject: subject.map(|s| s.trim().to_string()),
    };
    // deleted between the check and the write
    let note = store
        .update_note(id, caller.user_id, changes)
        .await?
        .ok_or(AppError::NotFound)?;

    info!(note_id = id, user_id = %caller.user_id, "note updated");
    Ok(note)
}

/// Removes the note and hands back what it was, so the caller can offer undo
/// by creating it again (new id, new timestamp).
pub async fn delete_note(store: &dyn Store, caller: &Principal, id: i64) -> AppResult<Note> {
    owned_note(store, id, caller).await?;

    let note = store
        .delete_note(id, caller.user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    info!(note_id = id, user_id = %caller.user_id, "note deleted");
    Ok(note)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{NewUser, Role},
        store::{MemoryStore, UserRepo},
    };
    use time::{macros::datetime, Duration};

    async fn principal(store: &MemoryStore, email: &str) -> Principal {
        let user = store
            .create_user(NewUser {
                name: None,
                email: email.into(),
                password_hash: "x".into(),
                role: Role::User,
            })
            .await
            .unwrap();
        Principal {
            user_id: user.id,
            role: user.role,
            expires_at: OffsetDateTime::now_utc() + Duration::hours(1),
        }
    }

    /// Inserts `n` notes one minute apart, oldest first.
    async fn seed(store: &MemoryStore, owner: &Principal, n: i64) -> Vec<Note> {
        let base = datetime!(2024-06-01 8:00 UTC);
        let mut out = Vec::new();
        for i in 0..n {
            out.push(
                store
                    .insert_note(NewNote {
                        user_id: owner.user_id,
                        title: format!("note {i}"),
                        subject: "misc".into(),
                        content: format!("body {i}"),
                        created_at: base + Duration::minutes(i),
                    })
                    .await
                    .unwrap(),
            );
        }
        out
    }

    #[tokio::test]
    async fn listing_is_scoped_to_the_caller() {
        let store = MemoryStore::new();
        let alice = principal(&store, "alice@example.com").await;
        let bob = principal(&store, "bob@example.com").await;
        seed(&store, &alice, 3).await;
        seed(&store, &bob, 4).await;

        let page = list_notes(&store, &alice, Some(1), None, None).await.unwrap();
        assert_eq!(page.notes.len(), 3);
        assert!(page.notes.iter().all(|n| n.user_id == alice.user_id));
        let page = list_notes(&store, &bob, Some(1), Some("note"), None).await.unwrap();
        assert!(page.notes.iter().all(|n| n.user_id == bob.user_id));
    }

    #[tokio::test]
    async fn pages_are_five_newest_first() {
        let store = MemoryStore::new();
        let alice = principal(&store, "alice@example.com").await;
        let seeded = seed(&store, &alice, 12).await;

        let first = list_notes(&store, &alice, Some(1), None, None).await.unwrap();
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.current_page, 1);
        let ids: Vec<i64> = first.notes.iter().map(|n| n.id).collect();
        let newest: Vec<i64> = seeded.iter().rev().take(5).map(|n| n.id).collect();
        assert_eq!(ids, newest);

        let last = list_notes(&store, &alice, Some(3), None, None).await.unwrap();
        assert_eq!(last.notes.len(), 2);
        assert_eq!(last.notes[1].id, seeded[0].id);
    }

    #[tokio::test]
    async fn page_past_the_end_is_empty_but_counts_pages() {
        let store = MemoryStore::new();
        let alice = principal(&store, "alice@example.com").await;
        seed(&store, &alice, 6).await;

        let page = list_notes(&store, &alice, Some(9), None, None).await.unwrap();
        assert!(page.notes.is_empty());
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.current_page, 9);
    }

    #[tokio::test]
    async fn math_and_bio_scenario() {
        let store = MemoryStore::new();
        let a = principal(&store, "a@example.com").await;
        // (title, subject, content)
        let math = create_note(&store, &a, "homework", "Math", "2+2=4").await.unwrap();
        let bio = create_note(&store, &a, "essay", "Bio", "cells...").await.unwrap();

        let by_subject = list_notes(&store, &a, None, None, Some("math")).await.unwrap();
        assert_eq!(by_subject.notes, vec![math.clone()]);

        let by_text = list_notes(&store, &a, None, Some("essay"), None).await.unwrap();
        assert_eq!(by_text.notes, vec![bio.clone()]);

        let text_e = list_notes(&store, &a, None, Some("E"), None).await.unwrap();
        assert_eq!(text_e.notes.len(), 2);
        assert!(text_e.notes.contains(&math) && text_e.notes.contains(&bio));

        let both = list_notes(&store, &a, None, Some("e"), Some("BIO")).await.unwrap();
        assert_eq!(both.notes, vec![bio]);
    }

    #[tokio::test]
    async fn search_all_is_unpaginated_and_blank_finds_nothing() {
        let store = MemoryStore::new();
        let alice = principal(&store, "alice@example.com").await;
        seed(&store, &alice, 8).await;

        let hits = search_all(&store, &alice, "BODY").await.unwrap();
        assert_eq!(hits.len(), 8);
        assert!(hits.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        assert!(search_all(&store, &alice, "  ").await.unwrap().is_empty());
        assert!(search_all(&store, &alice, "absent").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_requires_every_field() {
        let store = MemoryStore::new();
        let alice = principal(&store, "alice@example.com").await;
        let err = create_note(&store, &alice, "t", " ", "c").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m == "Subject is required"));
        let err = create_note(&store, &alice, "", "s", "c").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(list_notes(&store, &alice, None, None, None).await.unwrap().total_pages, 0);
    }

    #[tokio::test]
    async fn update_checks_existence_then_owner_then_fields() {
        let store = MemoryStore::new();
        let alice = principal(&store, "alice@example.com").await;
        let bob = principal(&store, "bob@example.com").await;
        let note = create_note(&store, &alice, "t", "s", "c").await.unwrap();

        let err = update_note(&store, &alice, 999, "", "", None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
        let err = update_note(&store, &bob, note.id, "", "", None).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        let err = update_note(&store, &alice, note.id, "t2", "", None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let updated = update_note(&store, &alice, note.id, "t2", "c2", None).await.unwrap();
        assert_eq!(updated.id, note.id);
        assert_eq!(updated.created_at, note.created_at);
        assert_eq!(updated.subject, "s");
        assert_eq!((updated.title.as_str(), updated.content.as_str()), ("t2", "c2"));

        let updated = update_note(&store, &alice, note.id, "t3", "c3", Some("new"))
            .await
            .unwrap();
        assert_eq!(updated.subject, "new");
    }

    #[tokio::test]
    async fn foreign_delete_is_forbidden_and_keeps_the_note() {
        let store = MemoryStore::new();
        let alice = principal(&store, "alice@example.com").await;
        let bob = principal(&store, "bob@example.com").await;
        let note = create_note(&store, &alice, "t", "s", "c").await.unwrap();

        let err = delete_note(&store, &bob, note.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        assert_eq!(get_note(&store, &alice, note.id).await.unwrap(), note);
        assert!(matches!(
            get_note(&store, &bob, note.id).await.unwrap_err(),
            AppError::Forbidden
        ));
    }

    #[tokio::test]
    async fn delete_then_undo_recreates_equal_content() {
        let store = MemoryStore::new();
        let alice = principal(&store, "alice@example.com").await;
        let original = create_note(&store, &alice, "Bio", "essay", "cells...").await.unwrap();

        let deleted = delete_note(&store, &alice, original.id).await.unwrap();
        assert_eq!(deleted, original);
        assert!(matches!(
            get_note(&store, &alice, original.id).await.unwrap_err(),
            AppError::NotFound
        ));

        let restored = create_note(&store, &alice, &deleted.title, &deleted.subject, &deleted.content)
            .await
            .unwrap();
        assert_eq!(
            (&restored.title, &restored.subject, &restored.content),
            (&original.title, &original.subject, &original.content)
        );
        assert_ne!(restored.id, original.id);
        assert!(restored.created_at >= original.created_at);
    }
}
