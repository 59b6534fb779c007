//! User Directory Service: CRUD and listing over the credential store.
//!
//! This is the only layer that sees full [`User`] records. Everything it
//! returns to callers is a [`PublicUser`], except `find_by_email`, which exists
//! for the auth flow's password check.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tracing::instrument;

use usergate_auth::PasswordHasher;
use usergate_core::pagination::DEFAULT_MAX_LIMIT;
use usergate_core::{Email, NewUser, Page, PageRequest, PublicUser, User, UserFilter, UserId, UserPatch};

use crate::log_forwarder::LogForwarder;
use crate::store::{StoreError, UserChanges, UserStore};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("User does not exist.")]
    NotFound,

    #[error("E-mail already exists.")]
    Conflict,

    #[error(transparent)]
    Store(StoreError),

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl From<StoreError> for DirectoryError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Duplicate(_) => DirectoryError::Conflict,
            other => DirectoryError::Store(other),
        }
    }
}

pub struct UserDirectory {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn PasswordHasher>,
    logs: LogForwarder,
    max_page_size: u32,
}

impl UserDirectory {
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn PasswordHasher>,
        logs: LogForwarder,
    ) -> Self {
        Self {
            store,
            hasher,
            logs,
            max_page_size: DEFAULT_MAX_LIMIT,
        }
    }

    /// Cap applied to the caller's `limit` in [`UserDirectory::find_all`].
    pub fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    /// Register a new user.
    ///
    /// The duplicate check runs before hashing so a taken email never reaches
    /// `insert`. A concurrent create that slips past the check is still
    /// rejected by the store's uniqueness rule and reported as `Conflict`.
    #[instrument(skip(self, input), fields(email = %input.email), err)]
    pub async fn create(&self, input: NewUser) -> Result<PublicUser, DirectoryError> {
        if self.store.find_by_email(&input.email).await?.is_some() {
            return Err(DirectoryError::Conflict);
        }

        let password_hash = self.hash(input.password).await?;
        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            name: input.name,
            email: input.email,
            password_hash,
            created_at: now,
            updated_at: now,
        };

        let public = user.to_public();
        self.store.insert(user).await?;

        tracing::info!(user_id = %public.id, "user created");
        self.logs.forward("user.created", json!({ "user": &public }));
        Ok(public)
    }

    /// Full record lookup, including the password hash.
    #[instrument(skip(self), fields(email = %email), err)]
    pub async fn find_by_email(&self, email: &Email) -> Result<Option<User>, DirectoryError> {
        Ok(self.store.find_by_email(email).await?)
    }

    /// One page of users matching `filter`, ordered by name.
    ///
    /// `page` defaults to 1 and `limit` to 10; both are clamped (see
    /// [`PageRequest::new`]).
    #[instrument(skip(self), err)]
    pub async fn find_all(
        &self,
        filter: UserFilter,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Page<PublicUser>, DirectoryError> {
        let request = PageRequest::new(page, limit, self.max_page_size);

        let total = self.store.count(&filter).await?;
        let users = self.store.list(&filter, request.window()).await?;

        Ok(Page::new(users, request, total).map(User::into_public))
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    pub async fn find_by_id(&self, id: UserId) -> Result<PublicUser, DirectoryError> {
        self.store
            .find_by_id(id)
            .await?
            .map(User::into_public)
            .ok_or(DirectoryError::NotFound)
    }

    /// Apply `patch` to an existing user. Only supplied fields change; a new
    /// password is re-hashed before the write.
    #[instrument(skip(self, patch), fields(user_id = %id), err)]
    pub async fn update(&self, id: UserId, patch: UserPatch) -> Result<PublicUser, DirectoryError> {
        self.find_by_id(id).await?;

        let mut changed = Vec::new();
        if patch.name.is_some() {
            changed.push("name");
        }
        if patch.email.is_some() {
            changed.push("email");
        }

        let password_hash = match patch.password {
            Some(password) => {
                changed.push("password");
                Some(self.hash(password).await?)
            }
            None => None,
        };

        let changes = UserChanges {
            name: patch.name,
            email: patch.email,
            password_hash,
            updated_at: Utc::now(),
        };

        let updated = self
            .store
            .update(id, changes)
            .await?
            .ok_or(DirectoryError::NotFound)?
            .into_public();

        tracing::info!(user_id = %id, fields = ?changed, "user updated");
        self.logs
            .forward("user.updated", json!({ "id": id, "fields": changed }));
        Ok(updated)
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    pub async fn remove(&self, id: UserId) -> Result<(), DirectoryError> {
        self.find_by_id(id).await?;

        // Someone else may have deleted it since the lookup.
        if !self.store.delete(id).await? {
            return Err(DirectoryError::NotFound);
        }

        tracing::info!(user_id = %id, "user removed");
        self.logs.forward("user.removed", json!({ "id": id }));
        Ok(())
    }

    async fn hash(&self, password: String) -> Result<String, DirectoryError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| DirectoryError::Hashing(e.to_string()))?
            .map_err(|e| DirectoryError::Hashing(e.to_string()))
    }
}

impl core::fmt::Debug for UserDirectory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UserDirectory")
            .field("max_page_size", &self.max_page_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    use usergate_auth::BcryptHasher;
    use usergate_core::PageWindow;
    use usergate_events::{InMemoryEventBus, LogEvent, Subscription};

    use crate::store::InMemoryUserStore;

    /// Counts inserts on top of an in-memory store. With `deletes_miss` set,
    /// `delete` reports that the row was already gone.
    #[derive(Default)]
    struct RecordingStore {
        inner: InMemoryUserStore,
        inserts: AtomicUsize,
        deletes_miss: AtomicBool,
    }

    #[async_trait::async_trait]
    impl UserStore for RecordingStore {
        async fn find_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> {
            self.inner.find_by_email(email).await
        }

        async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
            self.inner.find_by_id(id).await
        }

        async fn insert(&self, user: User) -> Result<(), StoreError> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            self.inner.insert(user).await
        }

        async fn update(&self, id: UserId, changes: UserChanges) -> Result<Option<User>, StoreError> {
            self.inner.update(id, changes).await
        }

        async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
            if self.deletes_miss.load(Ordering::SeqCst) {
                return Ok(false);
            }
            self.inner.delete(id).await
        }

        async fn count(&self, filter: &UserFilter) -> Result<u64, StoreError> {
            self.inner.count(filter).await
        }

        async fn list(&self, filter: &UserFilter, window: PageWindow) -> Result<Vec<User>, StoreError> {
            self.inner.list(filter, window).await
        }
    }

    struct Fixture {
        directory: UserDirectory,
        store: Arc<RecordingStore>,
        hasher: Arc<BcryptHasher>,
        events: Subscription<LogEvent>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(RecordingStore::default());
        let hasher = Arc::new(BcryptHasher::new(4).unwrap());
        let bus = Arc::new(InMemoryEventBus::<LogEvent>::new());
        let events = bus.subscribe();

        let logs = LogForwarder::new(bus).unwrap();
        let directory = UserDirectory::new(store.clone(), hasher.clone(), logs);
        Fixture {
            directory,
            store,
            hasher,
            events,
        }
    }

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser::new(name, email, "password").unwrap()
    }

    #[tokio::test]
    async fn create_stores_a_hash_that_verifies() {
        let fx = fixture();
        let email = Email::parse("john@test.com").unwrap();

        fx.directory
            .create(NewUser::new("John Doe", "john@test.com", "s3cret").unwrap())
            .await
            .unwrap();

        let stored = fx.directory.find_by_email(&email).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "s3cret");
        assert!(fx.hasher.verify("s3cret", &stored.password_hash));
        assert!(!fx.hasher.verify("wrong", &stored.password_hash));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_without_insert() {
        let fx = fixture();
        fx.directory.create(new_user("John", "john@test.com")).await.unwrap();
        assert_eq!(fx.store.inserts.load(Ordering::SeqCst), 1);

        let err = fx
            .directory
            .create(new_user("Johnny", "JOHN@test.com"))
            .await
            .unwrap_err();

        assert_eq!(err, DirectoryError::Conflict);
        assert_eq!(err.to_string(), "E-mail already exists.");
        assert_eq!(fx.store.inserts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unique_violation_at_insert_is_a_conflict() {
        assert_eq!(
            DirectoryError::from(StoreError::Duplicate("users_email_key".into())),
            DirectoryError::Conflict
        );
        assert!(matches!(
            DirectoryError::from(StoreError::Backend("down".into())),
            DirectoryError::Store(_)
        ));
    }

    #[tokio::test]
    async fn find_by_id_missing_is_not_found() {
        let fx = fixture();
        let err = fx.directory.find_by_id(UserId::new()).await.unwrap_err();
        assert_eq!(err, DirectoryError::NotFound);
        assert_eq!(err.to_string(), "User does not exist.");
    }

    #[tokio::test]
    async fn find_all_paginates_fifteen_records() {
        let fx = fixture();
        for i in 0..15 {
            fx.directory
                .create(new_user(&format!("User {i:02}"), &format!("user{i}@test.com")))
                .await
                .unwrap();
        }

        let first = fx
            .directory
            .find_all(UserFilter::default(), Some(1), Some(10))
            .await
            .unwrap();
        assert_eq!(first.data.len(), 10);
        assert_eq!(first.total, 15);
        assert_eq!(first.total_page, 2);
        assert_eq!(first.data[0].name, "User 00");

        let second = fx
            .directory
            .find_all(UserFilter::default(), Some(2), Some(10))
            .await
            .unwrap();
        assert_eq!(second.data.len(), 5);
        assert_eq!(second.page, 2);
        assert_eq!(second.data[0].name, "User 10");
    }

    #[tokio::test]
    async fn find_all_applies_filters_and_cap() {
        let fx = fixture();
        fx.directory.create(new_user("Alice", "alice@example.com")).await.unwrap();
        fx.directory.create(new_user("Bob", "bob@other.org")).await.unwrap();

        let page = fx
            .directory
            .find_all(UserFilter::new(None, Some("example".into())), None, None)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].name, "Alice");
        assert_eq!((page.page, page.limit), (1, 10));

        let capped = fixture().directory.with_max_page_size(5);
        let page = capped
            .find_all(UserFilter::default(), None, Some(1_000))
            .await
            .unwrap();
        assert_eq!(page.limit, 5);
    }

    #[tokio::test]
    async fn update_changes_only_supplied_fields() {
        let fx = fixture();
        let created = fx.directory.create(new_user("John", "john@test.com")).await.unwrap();

        let patch = UserPatch::new(Some("Updated Name"), None, None).unwrap();
        let updated = fx.directory.update(created.id, patch).await.unwrap();

        assert_eq!(updated.name, "Updated Name");
        assert_eq!(updated.email, created.email);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn update_rehashes_new_password() {
        let fx = fixture();
        let created = fx.directory.create(new_user("John", "john@test.com")).await.unwrap();

        let patch = UserPatch::new(None, None, Some("new-password".into())).unwrap();
        fx.directory.update(created.id, patch).await.unwrap();

        let stored = fx
            .directory
            .find_by_email(&created.email)
            .await
            .unwrap()
            .unwrap();
        assert!(fx.hasher.verify("new-password", &stored.password_hash));
        assert!(!fx.hasher.verify("password", &stored.password_hash));
    }

    #[tokio::test]
    async fn update_missing_or_conflicting() {
        let fx = fixture();
        let patch = UserPatch::new(Some("Ghost"), None, None).unwrap();
        assert_eq!(
            fx.directory.update(UserId::new(), patch).await.unwrap_err(),
            DirectoryError::NotFound
        );

        fx.directory.create(new_user("Alice", "alice@test.com")).await.unwrap();
        let bob = fx.directory.create(new_user("Bob", "bob@test.com")).await.unwrap();
        let patch = UserPatch::new(None, Some("alice@test.com"), None).unwrap();
        assert_eq!(
            fx.directory.update(bob.id, patch).await.unwrap_err(),
            DirectoryError::Conflict
        );
    }

    #[tokio::test]
    async fn remove_then_find_is_not_found() {
        let fx = fixture();
        let created = fx.directory.create(new_user("John", "john@test.com")).await.unwrap();

        fx.directory.remove(created.id).await.unwrap();

        assert_eq!(
            fx.directory.find_by_id(created.id).await.unwrap_err(),
            DirectoryError::NotFound
        );
        assert_eq!(
            fx.directory.remove(created.id).await.unwrap_err(),
            DirectoryError::NotFound
        );
    }

    #[tokio::test]
    async fn lifecycle_events_are_forwarded() {
        let fx = fixture();
        let created = fx.directory.create(new_user("John", "john@test.com")).await.unwrap();
        fx.directory.remove(created.id).await.unwrap();

        // Publishes run on the blocking pool, so arrival order is not fixed.
        let timeout = Duration::from_secs(5);
        let events = [
            fx.events.recv_timeout(timeout).unwrap(),
            fx.events.recv_timeout(timeout).unwrap(),
        ];
        let find = |pattern: &str| events.iter().find(|e| e.pattern() == pattern).unwrap();

        let created_event = find("user.created");
        assert_eq!(created_event.payload()["user"]["email"], "john@test.com");
        assert!(created_event.payload()["user"].get("password_hash").is_none());

        let removed_event = find("user.removed");
        assert_eq!(removed_event.payload()["id"], created.id.to_string());
    }

    #[tokio::test]
    async fn delete_lost_to_a_concurrent_remove_is_not_found() {
        let fx = fixture();
        let created = fx.directory.create(new_user("John", "john@test.com")).await.unwrap();
        fx.store.deletes_miss.store(true, Ordering::SeqCst);

        assert_eq!(
            fx.directory.remove(created.id).await.unwrap_err(),
            DirectoryError::NotFound
        );
        assert!(fx.directory.find_by_id(created.id).await.is_ok());
    }

    /// Holds every publish until `release` is dropped.
    struct StalledPublisher {
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl usergate_events::EventPublisher<LogEvent> for StalledPublisher {
        type Error = std::io::Error;

        fn publish(&self, _message: LogEvent) -> Result<(), Self::Error> {
            let release = self.release.lock().map_err(|_| std::io::Error::other("poisoned"))?;
            let _ = release.recv();
            Ok(())
        }
    }

    #[test]
    fn create_completes_while_log_publisher_is_stuck() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(1)
            .enable_all()
            .build()
            .unwrap();

        let (release, release_rx) = mpsc::channel::<()>();
        let logs = LogForwarder::with_capacity(
            StalledPublisher {
                release: Mutex::new(release_rx),
            },
            2,
        )
        .unwrap();
        let directory = UserDirectory::new(
            Arc::new(InMemoryUserStore::new()),
            Arc::new(BcryptHasher::new(4).unwrap()),
            logs,
        );

        runtime.block_on(async {
            for i in 0..6 {
                let created = tokio::time::timeout(
                    Duration::from_secs(10),
                    directory.create(new_user("User", &format!("user{i}@test.com"))),
                )
                .await
                .expect("create stalled behind the log publisher");
                assert!(created.is_ok());
            }
        });

        drop(release);
    }
}
