//! OAuth account linking
//!
//! Resolves an external Google profile to a local identity: find by
//! provider id, fall back to email (linking a pre-existing local account),
//! create as a last resort.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::models::User;
use super::session::{DEFAULT_CREDITS, DEFAULT_TIER};
use crate::common::safe_email_log;
use crate::users::{NewUser, StoreError, UserStore};

/// Fixed wait before the single retry of a pool-exhausted store call
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Profile fields handed over by the provider handshake
#[derive(Debug, Clone)]
pub struct GoogleProfile {
    pub id: String,
    pub email: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub picture: Option<String>,
    pub refresh_token: Option<String>,
}

impl GoogleProfile {
    /// "given family", trimmed; `None` when the provider sent neither part
    fn display_name(&self) -> Option<String> {
        let joined = format!(
            "{} {}",
            self.given_name.as_deref().unwrap_or(""),
            self.family_name.as_deref().unwrap_or("")
        );
        let trimmed = joined.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

pub struct AccountLinker {
    store: Arc<dyn UserStore>,
    retry_backoff: Duration,
}

impl AccountLinker {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self {
            store,
            retry_backoff: RETRY_BACKOFF,
        }
    }

    #[cfg(test)]
    pub fn with_backoff(store: Arc<dyn UserStore>, retry_backoff: Duration) -> Self {
        Self {
            store,
            retry_backoff,
        }
    }

    /// Runs one store call, retrying exactly once after a fixed backoff if
    /// the pool was exhausted. Every other error class propagates
    /// immediately; the wait holds no locks.
    async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T, StoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        match op().await {
            Err(StoreError::PoolExhausted) => {
                warn!(
                    backoff_ms = self.retry_backoff.as_millis() as u64,
                    "User store pool exhausted, retrying once"
                );
                tokio::time::sleep(self.retry_backoff).await;
                op().await
            }
            other => other,
        }
    }

    /// Resolve `profile` to a local identity, creating or linking as needed
    pub async fn link_or_create(&self, profile: &GoogleProfile) -> Result<User, StoreError> {
        if let Some(existing) = self
            .with_retry(|| self.store.find_by_google_id(&profile.id))
            .await?
        {
            debug!(user_id = %existing.id, "Google id already linked");
            return self
                .with_retry(|| {
                    self.store.update_google_session(
                        &existing.id,
                        profile.refresh_token.as_deref(),
                        profile.picture.as_deref(),
                    )
                })
                .await;
        }

        if let Some(local) = self
            .with_retry(|| self.store.find_by_email(&profile.email))
            .await?
        {
            info!(
                user_id = %local.id,
                email = %safe_email_log(&profile.email),
                "Linking Google identity to existing account"
            );
            return self
                .with_retry(|| {
                    self.store.attach_google(
                        &local.id,
                        &profile.id,
                        &profile.email,
                        profile.refresh_token.as_deref(),
                        profile.picture.as_deref(),
                    )
                })
                .await;
        }

        info!(
            email = %safe_email_log(&profile.email),
            "Creating new account from Google profile"
        );
        let created = self
            .with_retry(|| {
                self.store.create(NewUser {
                    email: profile.email.clone(),
                    name: profile.display_name(),
                    profile_image: profile.picture.clone(),
                    password_hash: None,
                    google_id: Some(profile.id.clone()),
                    google_email: Some(profile.email.clone()),
                    google_refresh_token: profile.refresh_token.clone(),
                    tier: DEFAULT_TIER.to_string(),
                    credits: DEFAULT_CREDITS.to_string(),
                })
            })
            .await;

        match created {
            Ok(user) => Ok(user),
            // A concurrent callback for the same brand-new identity won the
            // race on create; the unique index is the arbiter, so re-enter
            // the lookup chain instead of surfacing the conflict.
            Err(StoreError::UniqueViolation(detail)) => {
                debug!(detail = %detail, "Create lost a linking race, re-resolving");
                if let Some(existing) = self
                    .with_retry(|| self.store.find_by_google_id(&profile.id))
                    .await?
                {
                    return self
                        .with_retry(|| {
                            self.store.update_google_session(
                                &existing.id,
                                profile.refresh_token.as_deref(),
                                profile.picture.as_deref(),
                            )
                        })
                        .await;
                }
                if let Some(local) = self
                    .with_retry(|| self.store.find_by_email(&profile.email))
                    .await?
                {
                    return self
                        .with_retry(|| {
                            self.store.attach_google(
                                &local.id,
                                &profile.id,
                                &profile.email,
                                profile.refresh_token.as_deref(),
                                profile.picture.as_deref(),
                            )
                        })
                        .await;
                }
                Err(StoreError::UniqueViolation(detail))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory store with scriptable failures
    struct MockStore {
        users: Mutex<Vec<User>>,
        fail_queue: Mutex<VecDeque<StoreError>>,
        calls: AtomicUsize,
        fail_create_with_race: Mutex<Option<User>>,
    }

    impl MockStore {
        fn new() -> Self {
            Self {
                users: Mutex::new(Vec::new()),
                fail_queue: Mutex::new(VecDeque::new()),
                calls: AtomicUsize::new(0),
                fail_create_with_race: Mutex::new(None),
            }
        }

        fn push_failure(&self, err: StoreError) {
            self.fail_queue.lock().unwrap().push_back(err);
        }

        fn seed(&self, user: User) {
            self.users.lock().unwrap().push(user);
        }

        fn take_scripted_failure(&self) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_queue.lock().unwrap().pop_front() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    fn user(id: &str, email: &str) -> User {
        User {
            id: id.to_string(),
            email: email.to_string(),
            name: None,
            profile_image: None,
            password_hash: None,
            google_id: None,
            google_email: None,
            google_refresh_token: None,
            tier: DEFAULT_TIER.to_string(),
            credits: DEFAULT_CREDITS.to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    #[async_trait]
    impl UserStore for MockStore {
        async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
            self.take_scripted_failure()?;
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id == id)
                .cloned())
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            self.take_scripted_failure()?;
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.email.eq_ignore_ascii_case(email))
                .cloned())
        }

        async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
            self.take_scripted_failure()?;
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.google_id.as_deref() == Some(google_id))
                .cloned())
        }

        async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
            self.take_scripted_failure()?;

            // Simulate a concurrent callback committing first: the racing
            // row lands in the store and this create sees the constraint.
            if let Some(racer) = self.fail_create_with_race.lock().unwrap().take() {
                self.users.lock().unwrap().push(racer);
                return Err(StoreError::UniqueViolation("users.google_id".to_string()));
            }

            let mut users = self.users.lock().unwrap();
            if users
                .iter()
                .any(|u| u.email.eq_ignore_ascii_case(&new_user.email))
            {
                return Err(StoreError::UniqueViolation("users.email".to_string()));
            }
            let created = User {
                id: format!("user-{}", users.len() + 1),
                email: new_user.email.to_lowercase(),
                name: new_user.name,
                profile_image: new_user.profile_image,
                password_hash: new_user.password_hash,
                google_id: new_user.google_id,
                google_email: new_user.google_email,
                google_refresh_token: new_user.google_refresh_token,
                tier: new_user.tier,
                credits: new_user.credits,
                created_at: None,
                updated_at: None,
            };
            users.push(created.clone());
            Ok(created)
        }

        async fn attach_google(
            &self,
            id: &str,
            google_id: &str,
            google_email: &str,
            refresh_token: Option<&str>,
            profile_image: Option<&str>,
        ) -> Result<User, StoreError> {
            self.take_scripted_failure()?;
            let mut users = self.users.lock().unwrap();
            let user = users.iter_mut().find(|u| u.id == id).unwrap();
            user.google_id = Some(google_id.to_string());
            user.google_email = Some(google_email.to_string());
            user.google_refresh_token = refresh_token.map(str::to_string);
            if user.profile_image.is_none() {
                user.profile_image = profile_image.map(str::to_string);
            }
            Ok(user.clone())
        }

        async fn update_google_session(
            &self,
            id: &str,
            refresh_token: Option<&str>,
            profile_image: Option<&str>,
        ) -> Result<User, StoreError> {
            self.take_scripted_failure()?;
            let mut users = self.users.lock().unwrap();
            let user = users.iter_mut().find(|u| u.id == id).unwrap();
            if refresh_token.is_some() {
                user.google_refresh_token = refresh_token.map(str::to_string);
            }
            if user.profile_image.is_none() {
                user.profile_image = profile_image.map(str::to_string);
            }
            Ok(user.clone())
        }
    }

    fn profile() -> GoogleProfile {
        GoogleProfile {
            id: "google-1".to_string(),
            email: "a@x.com".to_string(),
            given_name: Some("Ada".to_string()),
            family_name: Some("Lovelace".to_string()),
            picture: Some("https://img.example/ada.png".to_string()),
            refresh_token: Some("rt-initial".to_string()),
        }
    }

    fn linker(store: &Arc<MockStore>) -> AccountLinker {
        AccountLinker::with_backoff(
            Arc::clone(store) as Arc<dyn UserStore>,
            Duration::from_millis(1),
        )
    }

    #[tokio::test]
    async fn creates_identity_with_defaults() {
        let store = Arc::new(MockStore::new());
        let created = linker(&store).link_or_create(&profile()).await.unwrap();

        assert_eq!(created.google_id.as_deref(), Some("google-1"));
        assert_eq!(created.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(created.tier, DEFAULT_TIER);
        assert_eq!(created.credits, DEFAULT_CREDITS);
        assert_eq!(store.users.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn idempotent_for_same_external_id() {
        let store = Arc::new(MockStore::new());
        let linker = linker(&store);

        let first = linker.link_or_create(&profile()).await.unwrap();
        let mut second_profile = profile();
        second_profile.refresh_token = Some("rt-rotated".to_string());
        let second = linker.link_or_create(&second_profile).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.users.lock().unwrap().len(), 1);
        assert_eq!(second.google_refresh_token.as_deref(), Some("rt-rotated"));
    }

    #[tokio::test]
    async fn email_fallback_links_existing_local_account() {
        let store = Arc::new(MockStore::new());
        let mut local = user("local-1", "a@x.com");
        local.password_hash = Some("argon2-hash".to_string());
        store.seed(local);

        let linked = linker(&store).link_or_create(&profile()).await.unwrap();

        assert_eq!(linked.id, "local-1");
        assert_eq!(linked.google_id.as_deref(), Some("google-1"));
        assert_eq!(linked.password_hash.as_deref(), Some("argon2-hash"));
        assert_eq!(store.users.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn existing_avatar_is_never_overwritten() {
        let store = Arc::new(MockStore::new());
        let mut local = user("local-1", "a@x.com");
        local.profile_image = Some("chosen.png".to_string());
        store.seed(local);

        let linked = linker(&store).link_or_create(&profile()).await.unwrap();
        assert_eq!(linked.profile_image.as_deref(), Some("chosen.png"));
    }

    #[tokio::test]
    async fn transient_failure_is_retried_exactly_once() {
        let store = Arc::new(MockStore::new());
        store.push_failure(StoreError::PoolExhausted);

        let created = linker(&store).link_or_create(&profile()).await.unwrap();
        assert_eq!(created.google_id.as_deref(), Some("google-1"));
        // find_by_google_id twice (failure + retry), find_by_email, create
        assert_eq!(store.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn back_to_back_transient_failures_propagate() {
        let store = Arc::new(MockStore::new());
        store.push_failure(StoreError::PoolExhausted);
        store.push_failure(StoreError::PoolExhausted);

        let err = linker(&store).link_or_create(&profile()).await.unwrap_err();
        assert!(matches!(err, StoreError::PoolExhausted));
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_transient_failures_are_not_retried() {
        let store = Arc::new(MockStore::new());
        store.push_failure(StoreError::Database(sqlx::Error::RowNotFound));

        let err = linker(&store).link_or_create(&profile()).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn create_race_resolves_to_the_winning_row() {
        let store = Arc::new(MockStore::new());
        let mut racer = user("racer-1", "a@x.com");
        racer.google_id = Some("google-1".to_string());
        *store.fail_create_with_race.lock().unwrap() = Some(racer);

        let resolved = linker(&store).link_or_create(&profile()).await.unwrap();
        assert_eq!(resolved.id, "racer-1");
        assert_eq!(store.users.lock().unwrap().len(), 1);
    }
}
