use serde::{Deserialize, Serialize};

use crate::models::Note;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateNoteRequest {
    pub title: String,
    pub subject: String,
    pub content: String,
}

/// Re-creating a deleted note from its snapshot is the undo path.
impl From<&Note> for CreateNoteRequest {
    fn from(n: &Note) -> Self {
        Self {
            title: n.title.clone(),
            subject: n.subject.clone(),
            content: n.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateNoteRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub subject: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListNotesParams {
    pub page: Option<i64>,
    pub search: Option<String>,
    pub subject: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteNoteResponse {
    pub success: bool,
    pub note: Note,
    /// Body to POST back to `/notes` to undo the delete.
    pub undo: CreateNoteRequest,
}
