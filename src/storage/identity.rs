// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity repository.
//!
//! The login flows only need a handful of lookups plus create/update; user
//! profile management lives elsewhere. [`MemoryIdentityRepository`] is the
//! in-process implementation used by the binary when no external user
//! database is wired in, and by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::auth::password::{self, PasswordError};
use crate::auth::Role;
use crate::models::Identity;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("identity not found")]
    NotFound,

    #[error("identity already exists: {0}")]
    Conflict(String),

    #[error("identity repository error: {0}")]
    Internal(String),
}

impl From<PasswordError> for RepositoryError {
    fn from(e: PasswordError) -> Self {
        RepositoryError::Internal(e.to_string())
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait IdentityRepository: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Identity>;

    /// Case-insensitive email lookup.
    async fn get_by_email(&self, email: &str) -> RepositoryResult<Identity>;

    async fn get_by_external_id(
        &self,
        provider: &str,
        external_id: &str,
    ) -> RepositoryResult<Identity>;

    async fn create(&self, identity: Identity) -> RepositoryResult<Identity>;

    /// Replace a stored identity. `updated_at` is set by the repository.
    async fn update(&self, identity: Identity) -> RepositoryResult<Identity>;
}

#[derive(Default)]
pub struct MemoryIdentityRepository {
    identities: RwLock<HashMap<Uuid, Identity>>,
}

impl MemoryIdentityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a local-password account.
    pub async fn seed_password_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> RepositoryResult<Identity> {
        let mut identity = Identity::new(name, email);
        identity.role = role;
        identity.hashed_password = Some(password::hash_password(password)?);

        let identity = self.create(identity).await?;
        info!(user_id = %identity.id, %role, "seeded password account");
        Ok(identity)
    }
}

fn same_email(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn same_external(identity: &Identity, provider: &str, external_id: &str) -> bool {
    identity.provider.as_deref() == Some(provider)
        && identity.external_id.as_deref() == Some(external_id)
}

/// Uniqueness checks against every other stored identity.
fn check_conflicts(
    identities: &HashMap<Uuid, Identity>,
    candidate: &Identity,
) -> RepositoryResult<()> {
    let others = identities.values().filter(|other| other.id != candidate.id);
    for other in others {
        if same_email(&other.email, &candidate.email) {
            return Err(RepositoryError::Conflict(format!(
                "email {}",
                candidate.email
            )));
        }
        if let (Some(provider), Some(external_id)) =
            (candidate.provider.as_deref(), candidate.external_id.as_deref())
        {
            if same_external(other, provider, external_id) {
                return Err(RepositoryError::Conflict(format!(
                    "{provider} account {external_id}"
                )));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl IdentityRepository for MemoryIdentityRepository {
    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Identity> {
        self.identities
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> RepositoryResult<Identity> {
        self.identities
            .read()
            .await
            .values()
            .find(|identity| same_email(&identity.email, email))
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn get_by_external_id(
        &self,
        provider: &str,
        external_id: &str,
    ) -> RepositoryResult<Identity> {
        self.identities
            .read()
            .await
            .values()
            .find(|identity| same_external(identity, provider, external_id))
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn create(&self, identity: Identity) -> RepositoryResult<Identity> {
        let mut identities = self.identities.write().await;
        if identities.contains_key(&identity.id) {
            return Err(RepositoryError::Conflict(format!("id {}", identity.id)));
        }
        check_conflicts(&identities, &identity)?;
        identities.insert(identity.id, identity.clone());
        Ok(identity)
    }

    async fn update(&self, mut identity: Identity) -> RepositoryResult<Identity> {
        let mut identities = self.identities.write().await;
        if !identities.contains_key(&identity.id) {
            return Err(RepositoryError::NotFound);
        }
        check_conflicts(&identities, &identity)?;
        identity.updated_at = Utc::now();
        identities.insert(identity.id, identity.clone());
        Ok(identity)
    }
}
