//! In-memory user store for tests/dev.

use std::collections::HashMap;
use std::sync::RwLock;

use usergate_core::{Email, PageWindow, User, UserFilter, UserId};

use super::{StoreError, UserChanges, UserStore};

/// In-memory user store.
///
/// - Email uniqueness is checked under the write lock, so concurrent inserts
///   cannot both succeed.
/// - Filters are case-sensitive substring matches.
/// - Not optimized for large data sets (listing sorts on every call).
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    inner: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> StoreError {
        StoreError::Backend("in-memory store lock poisoned".to_string())
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> {
        let map = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(map.values().find(|u| &u.email == email).cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let map = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(map.get(&id).cloned())
    }

    async fn insert(&self, user: User) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;

        if map.contains_key(&user.id) {
            return Err(StoreError::Duplicate(format!("id {}", user.id)));
        }
        if map.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(format!("email {}", user.email)));
        }

        map.insert(user.id, user);
        Ok(())
    }

    async fn update(&self, id: UserId, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;

        if let Some(email) = &changes.email {
            if map.values().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::Duplicate(format!("email {email}")));
            }
        }

        let Some(user) = map.get_mut(&id) else {
            return Ok(None);
        };
        changes.apply_to(user);
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        Ok(map.remove(&id).is_some())
    }

    async fn count(&self, filter: &UserFilter) -> Result<u64, StoreError> {
        let map = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(map.values().filter(|u| filter.matches(u)).count() as u64)
    }

    async fn list(&self, filter: &UserFilter, window: PageWindow) -> Result<Vec<User>, StoreError> {
        let map = self.inner.read().map_err(|_| Self::poisoned())?;

        let mut matching: Vec<&User> = map.values().filter(|u| filter.matches(u)).collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        let skip = usize::try_from(window.offset).unwrap_or(usize::MAX);
        let take = usize::try_from(window.limit).unwrap_or(usize::MAX);

        Ok(matching.into_iter().skip(skip).take(take).cloned().collect())
    }
}
