// std
use std::{
	collections::VecDeque,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};
// crates.io
use time::{Duration, OffsetDateTime};
// self
use lastplayed_broker::{
	auth::{AccessCredential, TokenSecret, UserId},
	cache::{CacheEntry, CredentialCache},
	error::{Error, FailureKind, TransientError},
	lifecycle::{AuthorizationSettings, CredentialManager},
	oauth::{ExchangeFuture, TokenExchangeClient, TokenGrant},
	provider::ProviderDescriptor,
	store::{
		CompareAndSwapOutcome, IdentityRecord, IdentityStore, MemoryStore, StoreError, StoreFuture,
	},
	url::Url,
};

/// Exchange double that issues `a1`, `a2`, ... on refresh and can be scripted to fail.
#[derive(Default)]
struct ScriptedExchange {
	code_grant: Option<TokenGrant>,
	identity: Option<UserId>,
	refresh_failures: Mutex<VecDeque<Error>>,
	refresh_delay: Option<std::time::Duration>,
	refresh_calls: AtomicUsize,
	code_calls: AtomicUsize,
}
impl ScriptedExchange {
	fn failing_refresh(error: Error) -> Self {
		let exchange = Self::default();

		exchange
			.refresh_failures
			.lock()
			.expect("Failure queue lock should not be poisoned.")
			.push_back(error);

		exchange
	}

	fn authorizing(user: &UserId, grant: TokenGrant) -> Self {
		Self { code_grant: Some(grant), identity: Some(user.clone()), ..Default::default() }
	}

	fn refresh_calls(&self) -> usize {
		self.refresh_calls.load(Ordering::SeqCst)
	}
}
impl TokenExchangeClient for ScriptedExchange {
	fn exchange_authorization_code<'a>(
		&'a self,
		_code: &'a str,
		_redirect_uri: &'a Url,
	) -> ExchangeFuture<'a, TokenGrant> {
		Box::pin(async move {
			self.code_calls.fetch_add(1, Ordering::SeqCst);

			self.code_grant
				.clone()
				.ok_or_else(|| Error::InvalidGrant { reason: "unknown code".into() })
		})
	}

	fn exchange_refresh_token<'a>(
		&'a self,
		_refresh_token: &'a TokenSecret,
	) -> ExchangeFuture<'a, TokenGrant> {
		Box::pin(async move {
			let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;

			if let Some(delay) = self.refresh_delay {
				tokio::time::sleep(delay).await;
			}

			let failure = self
				.refresh_failures
				.lock()
				.expect("Failure queue lock should not be poisoned.")
				.pop_front();

			match failure {
				Some(error) => Err(error),
				None => Ok(grant(&format!("a{call}"), None, 3600)),
			}
		})
	}

	fn fetch_identity<'a>(&'a self, _access: &'a AccessCredential) -> ExchangeFuture<'a, UserId> {
		Box::pin(async move {
			self.identity.clone().ok_or_else(|| Error::InvalidGrant { reason: "no identity".into() })
		})
	}
}

/// Memory store that counts lookups.
#[derive(Default)]
struct CountingStore {
	inner: MemoryStore,
	finds: AtomicUsize,
}
impl CountingStore {
	fn finds(&self) -> usize {
		self.finds.load(Ordering::SeqCst)
	}
}
impl IdentityStore for CountingStore {
	fn find<'a>(&'a self, user: &'a UserId) -> StoreFuture<'a, Option<IdentityRecord>> {
		self.finds.fetch_add(1, Ordering::SeqCst);
		self.inner.find(user)
	}

	fn upsert(&self, record: IdentityRecord) -> StoreFuture<'_, ()> {
		self.inner.upsert(record)
	}

	fn compare_and_swap<'a>(
		&'a self,
		user: &'a UserId,
		expected_refresh: &'a str,
		replacement: Option<IdentityRecord>,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		self.inner.compare_and_swap(user, expected_refresh, replacement)
	}
}

/// Store whose backend is permanently unreachable.
struct OfflineStore;
impl OfflineStore {
	fn offline<T>() -> Result<T, StoreError> {
		Err(StoreError::Backend { message: "database offline".into() })
	}
}
impl IdentityStore for OfflineStore {
	fn find<'a>(&'a self, _user: &'a UserId) -> StoreFuture<'a, Option<IdentityRecord>> {
		Box::pin(async { Self::offline() })
	}

	fn upsert(&self, _record: IdentityRecord) -> StoreFuture<'_, ()> {
		Box::pin(async { Self::offline() })
	}

	fn compare_and_swap<'a>(
		&'a self,
		_user: &'a UserId,
		_expected_refresh: &'a str,
		_replacement: Option<IdentityRecord>,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		Box::pin(async { Self::offline() })
	}
}

/// Store whose calls never complete.
struct HangingStore;
impl IdentityStore for HangingStore {
	fn find<'a>(&'a self, _user: &'a UserId) -> StoreFuture<'a, Option<IdentityRecord>> {
		Box::pin(std::future::pending())
	}

	fn upsert(&self, _record: IdentityRecord) -> StoreFuture<'_, ()> {
		Box::pin(std::future::pending())
	}

	fn compare_and_swap<'a>(
		&'a self,
		_user: &'a UserId,
		_expected_refresh: &'a str,
		_replacement: Option<IdentityRecord>,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		Box::pin(std::future::pending())
	}
}

const STORE_BOUND: std::time::Duration = std::time::Duration::from_millis(50);
const TEST_DEADLINE: std::time::Duration = std::time::Duration::from_secs(5);

fn user(id: &str) -> UserId {
	UserId::new(id).expect("User identifier fixture should be valid.")
}

fn grant(access: &str, refresh: Option<&str>, expires_in: i64) -> TokenGrant {
	TokenGrant {
		access_token: TokenSecret::new(access),
		refresh_token: refresh.map(TokenSecret::new),
		expires_in: Duration::seconds(expires_in),
	}
}

fn manager(exchange: Arc<ScriptedExchange>, store: Arc<dyn IdentityStore>) -> CredentialManager {
	let descriptor =
		ProviderDescriptor::spotify().expect("Spotify descriptor preset should validate.");
	let settings = AuthorizationSettings::from_descriptor(
		&descriptor,
		"client-lifecycle",
		Url::parse("https://badges.example.com/spotify/callback")
			.expect("Redirect URI fixture should parse successfully."),
		["user-read-recently-played"],
	);

	CredentialManager::new(exchange, store, settings)
}

async fn seed(store: &dyn IdentityStore, user: &UserId, refresh: &str) {
	store
		.upsert(IdentityRecord::new(user.clone(), TokenSecret::new(refresh)))
		.await
		.expect("Seeding the identity store should succeed.");
}

fn expired_entry(user: &UserId, refresh: &str) -> CacheEntry {
	let issued_at = OffsetDateTime::now_utc() - Duration::hours(2);

	CacheEntry::new(
		user.clone(),
		TokenSecret::new(refresh),
		AccessCredential::issued(TokenSecret::new("stale-access"), issued_at, Duration::hours(1)),
	)
}

#[tokio::test]
async fn unseen_user_is_unauthenticated_without_exchange() {
	let exchange = Arc::new(ScriptedExchange::default());
	let store = Arc::new(CountingStore::default());
	let manager = manager(exchange.clone(), store.clone());
	let err = manager
		.resolve_access_token(&user("stranger"))
		.await
		.expect_err("Unknown user should not resolve.");

	assert_eq!(err.kind(), FailureKind::Unauthenticated);
	assert!(matches!(err, Error::Unauthenticated { cause: None, .. }));
	assert_eq!(exchange.refresh_calls(), 0);
	assert_eq!(store.finds(), 1);
}

#[tokio::test]
async fn unexpired_entry_is_served_from_cache() {
	let exchange = Arc::new(ScriptedExchange::default());
	let store = Arc::new(CountingStore::default());
	let manager = manager(exchange.clone(), store.clone());
	let listener = user("cached");
	let access = AccessCredential::issued_now(TokenSecret::new("warm"), Duration::hours(1));

	manager.cache().put(CacheEntry::new(listener.clone(), TokenSecret::new("r"), access.clone()));

	let resolved =
		manager.resolve_access_token(&listener).await.expect("Cached credential should resolve.");

	assert_eq!(resolved, access);
	assert_eq!(exchange.refresh_calls(), 0);
	assert_eq!(store.finds(), 0);
	assert_eq!(manager.metrics.cache_hits(), 1);
}

#[tokio::test]
async fn expired_entry_is_refreshed_exactly_once() {
	let exchange = Arc::new(ScriptedExchange::default());
	let store = Arc::new(CountingStore::default());
	let manager = manager(exchange.clone(), store.clone());
	let listener = user("expired");
	let stale = expired_entry(&listener, "r-expired");

	manager.cache().put(stale.clone());

	let resolved =
		manager.resolve_access_token(&listener).await.expect("Expired entry should refresh.");
	let cached = manager.cache().get(&listener).expect("Refreshed entry should be cached.");

	assert_eq!(exchange.refresh_calls(), 1);
	assert_eq!(store.finds(), 0);
	assert!(resolved.expires_at > stale.access.expires_at);
	assert_eq!(cached.access, resolved);
	assert_eq!(cached.refresh_token.expose(), "r-expired");

	manager.resolve_access_token(&listener).await.expect("Fresh entry should resolve again.");

	assert_eq!(exchange.refresh_calls(), 1);
}

#[tokio::test]
async fn stored_refresh_token_mints_and_caches_access() {
	let exchange = Arc::new(ScriptedExchange::default());
	let store = Arc::new(CountingStore::default());
	let manager = manager(exchange.clone(), store.clone());
	let u1 = user("u1");

	seed(store.as_ref(), &u1, "r1").await;

	let before = OffsetDateTime::now_utc();
	let resolved = manager.resolve_access_token(&u1).await.expect("Stored user should resolve.");
	let after = OffsetDateTime::now_utc();
	let cached = manager.cache().get(&u1).expect("Resolved user should be cached.");

	assert_eq!(resolved.token.expose(), "a1");
	assert!(resolved.expires_at >= before + Duration::seconds(3600));
	assert!(resolved.expires_at <= after + Duration::seconds(3600));
	assert_eq!(cached.refresh_token.expose(), "r1");
	assert_eq!(store.finds(), 1);
	assert_eq!(manager.metrics.store_loads(), 1);
	assert_eq!(manager.metrics.refreshes(), 1);
}

#[tokio::test]
async fn failed_refresh_evicts_entry_and_keeps_record() {
	let exchange = Arc::new(ScriptedExchange::failing_refresh(
		TransientError::UpstreamEndpoint {
			message: "Request timed out while calling upstream".into(),
			status: None,
			retry_after: None,
		}
		.into(),
	));
	let store = Arc::new(CountingStore::default());
	let manager = manager(exchange.clone(), store.clone());
	let listener = user("flaky");

	seed(store.as_ref(), &listener, "r-flaky").await;
	manager.cache().put(expired_entry(&listener, "r-flaky"));

	let err =
		manager.resolve_access_token(&listener).await.expect_err("Failed refresh should surface.");

	match &err {
		Error::Unauthenticated { cause: Some(cause), .. } =>
			assert!(matches!(cause.as_ref(), Error::Transient(_))),
		other => panic!("Unexpected error variant: {other:?}."),
	}

	assert!(manager.cache().get(&listener).is_none());
	assert!(store.find(&listener).await.expect("Store lookup should succeed.").is_some());
	assert_eq!(manager.metrics.failures(), 1);

	let recovered = manager
		.resolve_access_token(&listener)
		.await
		.expect("Kept record should allow a later refresh.");

	assert_eq!(recovered.token.expose(), "a2");
}

#[tokio::test]
async fn rejected_refresh_token_is_discarded() {
	let exchange = Arc::new(ScriptedExchange::failing_refresh(Error::InvalidGrant {
		reason: "Refresh token revoked".into(),
	}));
	let store = Arc::new(CountingStore::default());
	let manager = manager(exchange.clone(), store.clone());
	let listener = user("revoked");

	seed(store.as_ref(), &listener, "r-revoked").await;

	let err = manager.resolve_access_token(&listener).await.expect_err("Rejected refresh fails.");

	assert_eq!(err.kind(), FailureKind::Unauthenticated);
	assert!(store.inner.is_empty());

	let err = manager
		.resolve_access_token(&listener)
		.await
		.expect_err("Discarded user should stay unauthenticated.");

	assert!(matches!(err, Error::Unauthenticated { cause: None, .. }));
	assert_eq!(exchange.refresh_calls(), 1);
}

#[tokio::test]
async fn concurrent_resolves_share_one_refresh() {
	let exchange = Arc::new(ScriptedExchange {
		refresh_delay: Some(std::time::Duration::from_millis(50)),
		..Default::default()
	});
	let store = Arc::new(CountingStore::default());
	let manager = manager(exchange.clone(), store.clone());
	let u2 = user("u2");

	seed(store.as_ref(), &u2, "r2").await;

	let (first, second) =
		tokio::join!(manager.resolve_access_token(&u2), manager.resolve_access_token(&u2));
	let first = first.expect("First concurrent resolve should succeed.");
	let second = second.expect("Second concurrent resolve should succeed.");

	assert_eq!(first, second);
	assert_eq!(exchange.refresh_calls(), 1);
	assert_eq!(store.finds(), 1);
}

#[tokio::test]
async fn store_outage_is_a_store_failure() {
	let exchange = Arc::new(ScriptedExchange::default());
	let manager = manager(exchange.clone(), Arc::new(OfflineStore));
	let err = manager
		.resolve_access_token(&user("offline"))
		.await
		.expect_err("Store outage should surface.");

	assert_eq!(err.kind(), FailureKind::Store);
	assert_eq!(exchange.refresh_calls(), 0);
}

#[tokio::test]
async fn hung_store_read_is_bounded_and_releases_the_user() {
	let exchange = Arc::new(ScriptedExchange::default());
	let manager =
		manager(exchange.clone(), Arc::new(HangingStore)).with_store_timeout(STORE_BOUND);
	let listener = user("stuck");

	for _ in 0..2 {
		let err = tokio::time::timeout(TEST_DEADLINE, manager.resolve_access_token(&listener))
			.await
			.expect("Resolve should give up once the store bound elapses.")
			.expect_err("Hung store should fail the resolve.");

		assert_eq!(err.kind(), FailureKind::Exchange);
		assert!(matches!(
			err,
			Error::Transient(TransientError::StoreTimeout { operation: "find", timeout })
				if timeout == STORE_BOUND
		));
	}

	assert_eq!(exchange.refresh_calls(), 0);
	assert_eq!(manager.metrics.failures(), 2);
}

#[tokio::test]
async fn hung_store_write_fails_authorization() {
	let listener = user("stuck-writer");
	let exchange = Arc::new(ScriptedExchange::authorizing(&listener, grant("a", Some("r"), 3600)));
	let manager = manager(exchange, Arc::new(HangingStore)).with_store_timeout(STORE_BOUND);
	let err = tokio::time::timeout(TEST_DEADLINE, manager.complete_authorization("code"))
		.await
		.expect("Authorization should give up once the store bound elapses.")
		.expect_err("Hung store should fail the authorization.");

	assert_eq!(err.kind(), FailureKind::Store);
	assert!(matches!(err, Error::Storage(StoreError::Backend { .. })));
	assert!(manager.cache().is_empty());
}

#[tokio::test]
async fn authorization_then_resolve_needs_no_exchange() {
	let listener = user("fresh-listener");
	let exchange =
		Arc::new(ScriptedExchange::authorizing(&listener, grant("a-code", Some("r-code"), 3600)));
	let store = Arc::new(CountingStore::default());
	let manager = manager(exchange.clone(), store.clone());
	let authorized =
		manager.complete_authorization("code-123").await.expect("Authorization should succeed.");
	let resolved =
		manager.resolve_access_token(&authorized).await.expect("Authorized user should resolve.");

	assert_eq!(authorized, listener);
	assert_eq!(resolved.token.expose(), "a-code");
	assert!(!resolved.is_expired());
	assert_eq!(exchange.refresh_calls(), 0);
	assert_eq!(store.finds(), 0);
	assert_eq!(store.inner.len(), 1);

	manager.complete_authorization("code-456").await.expect("Re-authorization should succeed.");

	assert_eq!(exchange.code_calls.load(Ordering::SeqCst), 2);
	assert_eq!(store.inner.len(), 1);
}

#[tokio::test]
async fn authorization_without_refresh_token_is_rejected() {
	let listener = user("no-refresh");
	let exchange = Arc::new(ScriptedExchange::authorizing(&listener, grant("a", None, 3600)));
	let store = Arc::new(CountingStore::default());
	let manager = manager(exchange, store.clone());
	let err =
		manager.complete_authorization("code").await.expect_err("Missing refresh token fails.");

	assert_eq!(err.kind(), FailureKind::Exchange);
	assert!(store.inner.is_empty());
	assert!(manager.cache().is_empty());
}

#[tokio::test]
async fn authorization_store_failure_leaves_cache_empty() {
	let listener = user("unlucky");
	let exchange = Arc::new(ScriptedExchange::authorizing(&listener, grant("a", Some("r"), 3600)));
	let manager = manager(exchange, Arc::new(OfflineStore));
	let err =
		manager.complete_authorization("code").await.expect_err("Store failure should surface.");

	assert_eq!(err.kind(), FailureKind::Store);
	assert!(manager.cache().get(&listener).is_none());
}

#[tokio::test]
async fn bounded_cache_evicts_soonest_expiring_user() {
	let exchange = Arc::new(ScriptedExchange::default());
	let store = Arc::new(CountingStore::default());
	let manager =
		manager(exchange.clone(), store.clone()).with_cache(CredentialCache::bounded(1));
	let (first, second) = (user("first"), user("second"));

	seed(store.as_ref(), &first, "r-first").await;
	seed(store.as_ref(), &second, "r-second").await;

	manager.resolve_access_token(&first).await.expect("First user should resolve.");
	manager.resolve_access_token(&second).await.expect("Second user should resolve.");

	assert_eq!(manager.cache().len(), 1);
	assert!(manager.cache().get(&second).is_some());

	manager.resolve_access_token(&first).await.expect("Evicted user should reload from store.");

	assert_eq!(exchange.refresh_calls(), 3);
	assert_eq!(store.finds(), 3);
}
