//! In-memory `ShareStore` for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::share::{
    Collaborator, OwnerSummary, ShareKind, ShareOutcome, ShareRole, SharedItem,
};
use crate::models::user::UserRow;
use crate::sharing::store::{ResourceOwner, ShareStore};

#[derive(Default)]
pub struct MemoryStore {
    pub users: Vec<UserRow>,
    pub resources: HashMap<(ShareKind, Uuid), (String, Option<Uuid>)>,
    pub shares: Mutex<HashMap<(ShareKind, Uuid, Uuid), (ShareRole, DateTime<Utc>)>>,
}

impl MemoryStore {
    fn user(&self, id: Uuid) -> Option<&UserRow> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn with_resource(
        mut self,
        kind: ShareKind,
        id: Uuid,
        title: &str,
        owner: Option<Uuid>,
    ) -> Self {
        self.resources.insert((kind, id), (title.to_string(), owner));
        self
    }

    pub fn grant(&self, kind: ShareKind, resource_id: Uuid, user_id: Uuid, role: ShareRole) {
        self.shares
            .lock()
            .unwrap()
            .insert((kind, resource_id, user_id), (role, Utc::now()));
    }

    pub fn share_count(&self) -> usize {
        self.shares.lock().unwrap().len()
    }
}

#[async_trait]
impl ShareStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>, AppError> {
        Ok(self.users.iter().find(|u| u.email == email).cloned())
    }

    async fn resource_owner(
        &self,
        kind: ShareKind,
        resource_id: Uuid,
    ) -> Result<Option<ResourceOwner>, AppError> {
        Ok(self
            .resources
            .get(&(kind, resource_id))
            .map(|(_, owner_id)| ResourceOwner { owner_id: *owner_id }))
    }

    async fn upsert_share(
        &self,
        kind: ShareKind,
        resource_id: Uuid,
        user_id: Uuid,
        role: ShareRole,
    ) -> Result<ShareOutcome, AppError> {
        let mut shares = self.shares.lock().unwrap();
        match shares.get_mut(&(kind, resource_id, user_id)) {
            Some(existing) => {
                existing.0 = role;
                Ok(ShareOutcome::Updated)
            }
            None => {
                shares.insert((kind, resource_id, user_id), (role, Utc::now()));
                Ok(ShareOutcome::Created)
            }
        }
    }

    async fn delete_share(
        &self,
        kind: ShareKind,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        Ok(self
            .shares
            .lock()
            .unwrap()
            .remove(&(kind, resource_id, user_id))
            .is_some())
    }

    async fn share_role(
        &self,
        kind: ShareKind,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ShareRole>, AppError> {
        Ok(self
            .shares
            .lock()
            .unwrap()
            .get(&(kind, resource_id, user_id))
            .map(|(role, _)| *role))
    }

    async fn shared_with(
        &self,
        kind: ShareKind,
        user_id: Uuid,
    ) -> Result<Vec<SharedItem>, AppError> {
        let shares = self.shares.lock().unwrap();
        Ok(shares
            .iter()
            .filter(|((k, _, u), _)| *k == kind && *u == user_id)
            .map(|((_, resource_id, _), (role, at))| {
                let (title, owner_id) = &self.resources[&(kind, *resource_id)];
                SharedItem {
                    id: *resource_id,
                    title: title.clone(),
                    shared_role: *role,
                    owner: owner_id.and_then(|id| self.user(id)).map(|u| OwnerSummary {
                        name: u.name.clone(),
                        email: u.email.clone(),
                    }),
                    shared_at: *at,
                }
            })
            .collect())
    }

    async fn collaborators(
        &self,
        kind: ShareKind,
        resource_id: Uuid,
    ) -> Result<Vec<Collaborator>, AppError> {
        let shares = self.shares.lock().unwrap();
        Ok(shares
            .iter()
            .filter(|((k, r, _), _)| *k == kind && *r == resource_id)
            .filter_map(|((_, _, user_id), (role, at))| {
                self.user(*user_id).map(|u| Collaborator {
                    id: Uuid::new_v4(),
                    user_id: u.id,
                    name: u.name.clone(),
                    email: u.email.clone(),
                    avatar_url: None,
                    role: *role,
                    created_at: *at,
                })
            })
            .collect())
    }
}

pub fn user(email: &str, role: &str) -> UserRow {
    UserRow {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: None,
        name: email.split('@').next().unwrap_or_default().to_string(),
        role: role.to_string(),
        provider: "LOCAL".to_string(),
        avatar_url: None,
        created_at: Utc::now(),
    }
}
