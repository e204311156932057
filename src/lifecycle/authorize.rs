//! Authorization-code completion.
//!
//! The upstream exchange and identity lookup run without any lock. The identity store upsert
//! is the commit point: the cache is written only after it succeeds, under the same per-user
//! guard resolves use. An upsert that outlives [`CredentialManager::store_timeout`] is reported
//! as a store failure.

mod session;

pub use session::AuthorizationSession;

// self
use crate::{
	_prelude::*,
	auth::UserId,
	cache::CacheEntry,
	error::ConfigError,
	lifecycle::{CredentialManager, common},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::ProviderDescriptor,
	store::{IdentityRecord, StoreError},
};

/// Client parameters used for authorize URLs and code exchanges.
#[derive(Clone, Debug)]
pub struct AuthorizationSettings {
	/// Provider authorization endpoint.
	pub authorization_endpoint: Url,
	/// OAuth client identifier.
	pub client_id: String,
	/// Redirect URI registered with the provider.
	pub redirect_uri: Url,
	/// Requested scopes.
	pub scopes: Vec<String>,
	/// Delimiter used to join `scopes`.
	pub scope_delimiter: char,
	/// Forces the provider's consent dialog on every authorization.
	pub show_dialog: bool,
}
impl AuthorizationSettings {
	/// Derives settings from a provider descriptor.
	pub fn from_descriptor<I, S>(
		descriptor: &ProviderDescriptor,
		client_id: impl Into<String>,
		redirect_uri: Url,
		scopes: I,
	) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			authorization_endpoint: descriptor.endpoints.authorization.clone(),
			client_id: client_id.into(),
			redirect_uri,
			scopes: scopes.into_iter().map(Into::into).collect(),
			scope_delimiter: descriptor.quirks.scope_delimiter,
			show_dialog: descriptor.quirks.show_dialog,
		}
	}
}

impl CredentialManager {
	/// Builds a fresh authorize URL and `state` for the redirect to the provider.
	pub fn start_authorization(&self) -> AuthorizationSession {
		session::build_session(&self.settings)
	}

	/// Exchanges the callback `code`, identifies the user, and records their credentials.
	///
	/// Returns the authorized [`UserId`]. Exchange and identity failures leave both the store
	/// and the cache untouched; a store failure is returned as [`Error::Storage`] and the cache
	/// stays untouched as well.
	pub async fn complete_authorization(&self, code: &str) -> Result<UserId> {
		const KIND: FlowKind = FlowKind::Authorization;

		let span = FlowSpan::new(KIND, "complete_authorization");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.authorize(code)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(err) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				obs::warn_flow_failure(KIND, None, err);
			},
		}

		result
	}

	async fn authorize(&self, code: &str) -> Result<UserId> {
		let issued_at = OffsetDateTime::now_utc();
		let grant =
			self.exchange.exchange_authorization_code(code, &self.settings.redirect_uri).await?;
		let refresh_token = grant.refresh_token.clone().ok_or(ConfigError::MissingRefreshToken)?;
		let access = grant.access_credential(issued_at);
		let user = self.exchange.fetch_identity(&access).await?;
		let guard = common::flow_guard(self, &user);
		let _singleflight = guard.lock().await;
		let record = IdentityRecord::new(user.clone(), refresh_token.clone());
		let committed = common::bounded_store_call(self.store_timeout, self.store.upsert(record))
			.await
			.unwrap_or_else(|timeout| Err(StoreError::timed_out("upsert", timeout)));

		committed?;
		self.cache.put(CacheEntry::new(user.clone(), refresh_token, access));

		Ok(user)
	}
}
