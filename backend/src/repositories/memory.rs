//! In-process principal store.
//!
//! Each save is applied atomically under the write lock and version-checked,
//! which gives the same per-document semantics as the PostgreSQL store.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::models::user::{LoginKey, Principal, PrincipalUpdate};
use crate::repositories::principal::{PrincipalStore, StoreError, StoreResult};
use crate::types::UserId;

#[derive(Default)]
pub struct InMemoryPrincipalStore {
    principals: RwLock<HashMap<UserId, Principal>>,
}

impl InMemoryPrincipalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_key(principal: &Principal, key: &LoginKey) -> bool {
    match key {
        LoginKey::Email(email) => principal.email.as_deref() == Some(email.as_str()),
        LoginKey::Mobile(mobile) => principal.mobile.as_deref() == Some(mobile.as_str()),
    }
}

fn ensure_unique(
    principals: &HashMap<UserId, Principal>,
    candidate: &Principal,
) -> StoreResult<()> {
    for other in principals.values().filter(|other| other.id != candidate.id) {
        if candidate.email.is_some() && other.email == candidate.email {
            return Err(StoreError::Duplicate("email".into()));
        }
        if candidate.mobile.is_some() && other.mobile == candidate.mobile {
            return Err(StoreError::Duplicate("mobile".into()));
        }
    }
    Ok(())
}

#[async_trait]
impl PrincipalStore for InMemoryPrincipalStore {
    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<Principal>> {
        Ok(self.principals.read().await.get(&id).cloned())
    }

    async fn find_by_unique_key(&self, key: &LoginKey) -> StoreResult<Option<Principal>> {
        Ok(self
            .principals
            .read()
            .await
            .values()
            .find(|principal| matches_key(principal, key))
            .cloned())
    }

    async fn save(&self, principal: &Principal) -> StoreResult<Principal> {
        let mut principals = self.principals.write().await;
        let current_version = principals.get(&principal.id).map(|stored| stored.version);
        match current_version {
            Some(version) if version != principal.version => return Err(StoreError::Conflict),
            None if principal.version != 0 => return Err(StoreError::Conflict),
            _ => {}
        }
        ensure_unique(&principals, principal)?;

        let mut stored = principal.clone();
        stored.version += 1;
        stored.updated_at = Utc::now();
        principals.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_fields(
        &self,
        id: UserId,
        update: PrincipalUpdate,
    ) -> StoreResult<Option<Principal>> {
        let mut principals = self.principals.write().await;
        let Some(stored) = principals.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(full_name) = update.full_name {
            stored.full_name = full_name;
        }
        if let Some(role) = update.role {
            stored.role = role;
        }
        if let Some(password_hash) = update.password_hash {
            stored.password_hash = Some(password_hash);
        }
        stored.version += 1;
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }

    async fn list(&self, limit: i64, offset: i64) -> StoreResult<(Vec<Principal>, i64)> {
        let principals = self.principals.read().await;
        let mut all: Vec<&Principal> = principals.values().collect();
        all.sort_by_key(|principal| (principal.created_at, principal.id));
        let total = all.len() as i64;
        let page = all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRole;

    fn principal(email: &str) -> Principal {
        Principal::new(
            Some(email.into()),
            None,
            None,
            "Test".into(),
            UserRole::Standard,
        )
    }

    #[tokio::test]
    async fn save_bumps_version_and_rejects_stale_writes() {
        let store = InMemoryPrincipalStore::new();
        let created = store.save(&principal("a@example.com")).await.unwrap();
        assert_eq!(created.version, 1);

        let updated = store.save(&created).await.unwrap();
        assert_eq!(updated.version, 2);

        let stale = store.save(&created).await;
        assert!(matches!(stale, Err(StoreError::Conflict)));
    }

    #[tokio::test]
    async fn unsaved_principal_with_nonzero_version_conflicts() {
        let store = InMemoryPrincipalStore::new();
        let mut p = principal("b@example.com");
        p.version = 3;
        assert!(matches!(store.save(&p).await, Err(StoreError::Conflict)));
    }

    #[tokio::test]
    async fn unique_keys_are_enforced() {
        let store = InMemoryPrincipalStore::new();
        store.save(&principal("dup@example.com")).await.unwrap();
        let result = store.save(&principal("dup@example.com")).await;
        assert!(matches!(result, Err(StoreError::Duplicate(_))));
    }

    #[tokio::test]
    async fn find_by_unique_key_and_update_fields() {
        let store = InMemoryPrincipalStore::new();
        let created = store.save(&principal("c@example.com")).await.unwrap();

        let found = store
            .find_by_unique_key(&LoginKey::email("C@example.com"))
            .await
            .unwrap()
            .expect("found by email");
        assert_eq!(found.id, created.id);

        let updated = store
            .update_fields(
                created.id,
                PrincipalUpdate {
                    role: Some(UserRole::Provider),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .expect("updated");
        assert_eq!(updated.role, UserRole::Provider);
        assert_eq!(updated.version, created.version + 1);

        let missing = store
            .update_fields(UserId::new(), PrincipalUpdate::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn list_pages_in_creation_order() {
        let store = InMemoryPrincipalStore::new();
        for i in 0..3 {
            store
                .save(&principal(&format!("user{i}@example.com")))
                .await
                .unwrap();
        }
        let (page, total) = store.list(2, 1).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
    }
}
