//! Credential lifecycle manager: the component the badge routes talk to.
//!
//! [`CredentialManager`] owns the in-process [`CredentialCache`], the durable [`IdentityStore`],
//! and the [`TokenExchangeClient`]. The store is the source of truth for refresh tokens; the
//! cache only holds working copies and is written after the store commits.

pub mod authorize;
pub mod resolve;

mod common;

pub use authorize::*;
pub use resolve::*;

// self
use crate::{
	_prelude::*,
	auth::UserId,
	cache::CredentialCache,
	oauth::TokenExchangeClient,
	store::IdentityStore,
};
#[cfg(feature = "reqwest")]
use crate::{
	config::BrokerConfig,
	http::ReqwestHttpClient,
	oauth::{ReqwestExchangeClient, ReqwestTransportErrorMapper},
	provider::{DefaultProviderStrategy, ProviderDescriptor},
};

/// Resolves access tokens for users and completes authorizations.
///
/// Cloning is cheap; clones share the cache, the store, the exchange client, and the
/// single-flight guards.
#[derive(Clone)]
pub struct CredentialManager {
	/// Upstream token and identity client.
	pub exchange: Arc<dyn TokenExchangeClient>,
	/// Durable refresh-token store.
	pub store: Arc<dyn IdentityStore>,
	/// Parameters used to build authorize URLs and exchange codes.
	pub settings: AuthorizationSettings,
	/// Always-on counters describing resolve traffic.
	pub metrics: Arc<ResolveMetrics>,
	/// Upper bound on every identity store call.
	pub store_timeout: std::time::Duration,
	cache: CredentialCache,
	flow_guards: Arc<Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>>,
}
impl CredentialManager {
	/// Store timeout used until [`CredentialManager::with_store_timeout`] overrides it.
	pub const DEFAULT_STORE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

	/// Creates a manager with an empty, unbounded cache.
	pub fn new(
		exchange: Arc<dyn TokenExchangeClient>,
		store: Arc<dyn IdentityStore>,
		settings: AuthorizationSettings,
	) -> Self {
		Self {
			exchange,
			store,
			settings,
			metrics: Default::default(),
			store_timeout: Self::DEFAULT_STORE_TIMEOUT,
			cache: CredentialCache::unbounded(),
			flow_guards: Default::default(),
		}
	}

	/// Replaces the cache, e.g. with [`CredentialCache::bounded`].
	pub fn with_cache(mut self, cache: CredentialCache) -> Self {
		self.cache = cache;

		self
	}

	/// Bounds identity store calls by `timeout`.
	pub fn with_store_timeout(mut self, timeout: std::time::Duration) -> Self {
		self.store_timeout = timeout;

		self
	}

	/// Cache shared by every clone of this manager.
	pub fn cache(&self) -> &CredentialCache {
		&self.cache
	}
}
#[cfg(feature = "reqwest")]
impl CredentialManager {
	/// Wires the reqwest transport, the default provider strategy, and `store` from `config`.
	pub fn from_config(
		config: &BrokerConfig,
		descriptor: &ProviderDescriptor,
		store: Arc<dyn IdentityStore>,
	) -> Result<Self> {
		let http_client = ReqwestHttpClient::new(config.http_timeout)?;
		let exchange = ReqwestExchangeClient::from_descriptor(
			descriptor,
			&config.client_id,
			Some(&config.client_secret),
			Arc::new(DefaultProviderStrategy),
			http_client,
			ReqwestTransportErrorMapper,
		)?;
		let settings = AuthorizationSettings::from_descriptor(
			descriptor,
			config.client_id.as_str(),
			config.redirect_uri()?,
			config.scopes.iter().cloned(),
		);

		Ok(Self::new(Arc::new(exchange), store, settings).with_store_timeout(config.store_timeout))
	}
}
impl Debug for CredentialManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialManager")
			.field("settings", &self.settings)
			.field("cached_users", &self.cache.len())
			.field("metrics", &self.metrics)
			.field("store_timeout", &self.store_timeout)
			.finish()
	}
}
