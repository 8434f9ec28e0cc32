use std::collections::HashMap;

use tracing::{info, warn};
use uuid::Uuid;

use super::dto::AdminUserView;
use crate::{
    auth::{
        services::{create_account, ADMIN_MIN_NAME_LEN},
        Principal,
    },
    error::{AppError, AppResult},
    models::{Note, Role, User},
    store::{NoteRepo, Store, UserRepo},
};

/// Non-admin accounts, newest first, each with its notes newest first.
pub async fn list_users(store: &dyn Store) -> AppResult<Vec<AdminUserView>> {
    let users = store.list_users_with_role(Role::User).await?;
    let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();

    let mut by_owner: HashMap<Uuid, Vec<Note>> = HashMap::new();
    for note in store.notes_by_owners(&ids).await? {
        by_owner.entry(note.user_id).or_default().push(note);
    }

    Ok(users
        .into_iter()
        .map(|u| {
            let notes = by_owner.remove(&u.id).unwrap_or_default();
            AdminUserView::new(u, notes)
        })
        .collect())
}

pub async fn delete_user(store: &dyn Store, admin: &Principal, id: Uuid) -> AppResult<()> {
    if id == admin.user_id {
        warn!(user_id = %id, "admin tried to delete own account");
        return Err(AppError::invalid_operation("You can't delete yourself"));
    }
    if !store.delete_user_cascade(id).await? {
        return Err(AppError::NotFound);
    }
    info!(user_id = %id, by = %admin.user_id, "user deleted");
    Ok(())
}

/// Applies from the user's next request; the guard reads the stored role.
pub async fn set_role(store: &dyn Store, admin: &Principal, id: Uuid, role: Role) -> AppResult<User> {
    let user = store
        .set_user_role(id, role)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(user_id = %id, role = %role, by = %admin.user_id, "role changed");
    Ok(user)
}

pub async fn create_user(
    store: &dyn Store,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
) -> AppResult<User> {
    create_account(store, name, email, password, role, ADMIN_MIN_NAME_LEN).await
}
