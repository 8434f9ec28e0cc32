//! Note listing rules: owner scoping, case-insensitive filters, ordering and
//! page math. Stores translate [`NoteFilter`] into their own query language;
//! [`NoteFilter::matches`] is the reference behaviour.

use std::cmp::Ordering;

use serde::Serialize;
use uuid::Uuid;

use crate::models::Note;

/// Fixed page size of the notes listing.
pub const PAGE_SIZE: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteFilter {
    pub owner: Uuid,
    /// Matched against title OR content. Empty matches everything.
    pub search: String,
    /// Matched against subject. Empty matches everything.
    pub subject: String,
}

impl NoteFilter {
    pub fn new(owner: Uuid, search: Option<&str>, subject: Option<&str>) -> Self {
        Self {
            owner,
            search: search.map(str::trim).unwrap_or_default().to_string(),
            subject: subject.map(str::trim).unwrap_or_default().to_string(),
        }
    }

    pub fn matches(&self, note: &Note) -> bool {
        note.user_id == self.owner
            && contains_ci(&note.subject, &self.subject)
            && (contains_ci(&note.title, &self.search) || contains_ci(&note.content, &self.search))
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Listing order: newest first, ties by id ascending.
pub fn newest_first(a: &Note, b: &Note) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// Slice of an ordered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub size: i64,
}

impl PageRequest {
    /// Pages are 1-based; anything below 1 reads as the first page.
    pub fn new(page: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            size: PAGE_SIZE,
        }
    }

    pub fn window(&self) -> Window {
        Window {
            offset: (self.page - 1).saturating_mul(self.size),
            limit: self.size,
        }
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 {
            0
        } else {
            (total + self.size - 1) / self.size
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePage {
    pub notes: Vec<Note>,
    pub current_page: i64,
    pub total_pages: i64,
}
