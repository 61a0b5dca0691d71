use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::share::{Collaborator, ShareKind, ShareOutcome, ShareRole, SharedItem};
use crate::models::user::UserRow;
use crate::sharing::store::ShareStore;

#[derive(Debug, Serialize)]
pub struct SharedWithMe {
    pub projects: Vec<SharedItem>,
    pub videos: Vec<SharedItem>,
    pub folders: Vec<SharedItem>,
}

/// Owner or admin only. `action` completes "Only the owner can ... this <kind>".
pub async fn authorize_owner(
    store: &dyn ShareStore,
    kind: ShareKind,
    resource_id: Uuid,
    requester: &UserRow,
    action: &str,
) -> Result<(), AppError> {
    let owner = store
        .resource_owner(kind, resource_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} not found", kind.label())))?;

    if requester.is_admin() || owner.owner_id == Some(requester.id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Only the owner can {action} this {}",
            kind.label().to_lowercase()
        )))
    }
}

/// Only the resource owner (or an admin) may change who it is shared with.
async fn authorize_manage(
    store: &dyn ShareStore,
    kind: ShareKind,
    resource_id: Uuid,
    requester: &UserRow,
) -> Result<(), AppError> {
    authorize_owner(store, kind, resource_id, requester, "manage sharing for").await
}

/// Owner, admin, or anyone the resource is shared with.
pub async fn authorize_view(
    store: &dyn ShareStore,
    kind: ShareKind,
    resource_id: Uuid,
    requester: &UserRow,
) -> Result<(), AppError> {
    let owner = store
        .resource_owner(kind, resource_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} not found", kind.label())))?;

    if requester.is_admin() || owner.owner_id == Some(requester.id) {
        return Ok(());
    }
    match store.share_role(kind, resource_id, requester.id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::Forbidden("Access denied".to_string())),
    }
}

/// Owner, admin, or a collaborator holding the EDITOR role.
pub async fn authorize_edit(
    store: &dyn ShareStore,
    kind: ShareKind,
    resource_id: Uuid,
    requester: &UserRow,
) -> Result<(), AppError> {
    let owner = store
        .resource_owner(kind, resource_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} not found", kind.label())))?;

    if requester.is_admin() || owner.owner_id == Some(requester.id) {
        return Ok(());
    }
    match store.share_role(kind, resource_id, requester.id).await? {
        Some(ShareRole::Editor) => Ok(()),
        _ => Err(AppError::Forbidden("Editor access required".to_string())),
    }
}

/// Accounts are stored with trimmed, lowercased emails.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Grants `target_email` the given role on a resource.
/// An existing share for the same user has its role overwritten.
pub async fn share_resource(
    store: &dyn ShareStore,
    kind: ShareKind,
    resource_id: Uuid,
    target_email: &str,
    role: ShareRole,
    requester: &UserRow,
) -> Result<ShareOutcome, AppError> {
    authorize_manage(store, kind, resource_id, requester).await?;

    let target = store
        .find_user_by_email(&normalize_email(target_email))
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if target.id == requester.id {
        return Err(AppError::Validation("Cannot share with yourself".to_string()));
    }

    let outcome = store.upsert_share(kind, resource_id, target.id, role).await?;
    info!(
        "{} {resource_id} shared with user {} as {role} ({outcome:?})",
        kind.label(),
        target.id
    );
    Ok(outcome)
}

/// Revokes a user's access. Fails with `NotFound` if no share exists.
/// Collaborators may always remove their own share.
pub async fn remove_share(
    store: &dyn ShareStore,
    kind: ShareKind,
    resource_id: Uuid,
    user_id: Uuid,
    requester: &UserRow,
) -> Result<(), AppError> {
    if user_id != requester.id {
        authorize_manage(store, kind, resource_id, requester).await?;
    }

    if !store.delete_share(kind, resource_id, user_id).await? {
        return Err(AppError::NotFound("Share not found".to_string()));
    }
    info!("{} {resource_id} no longer shared with user {user_id}", kind.label());
    Ok(())
}

pub async fn get_shared_with_me(
    store: &dyn ShareStore,
    user_id: Uuid,
) -> Result<SharedWithMe, AppError> {
    let (projects, videos, folders) = tokio::try_join!(
        store.shared_with(ShareKind::Project, user_id),
        store.shared_with(ShareKind::Video, user_id),
        store.shared_with(ShareKind::Folder, user_id),
    )?;
    Ok(SharedWithMe {
        projects,
        videos,
        folders,
    })
}

pub async fn get_collaborators(
    store: &dyn ShareStore,
    kind: ShareKind,
    resource_id: Uuid,
    requester: &UserRow,
) -> Result<Vec<Collaborator>, AppError> {
    authorize_view(store, kind, resource_id, requester).await?;
    store.collaborators(kind, resource_id).await
}
