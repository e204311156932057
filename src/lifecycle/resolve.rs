//! Access-token resolution with single-flight refreshes and CAS rotation.
//!
//! [`CredentialManager::resolve_access_token`] answers from the cache while the cached access
//! credential is unexpired. Otherwise it takes the per-user guard, re-checks the cache, loads
//! the refresh token from the cache or the identity store, and performs one
//! `grant_type=refresh_token` exchange. Rotated refresh tokens are written back with
//! `IdentityStore::compare_and_swap`; rejected ones are removed from the store.
//!
//! Store calls are bounded by [`CredentialManager::store_timeout`]. An abandoned call counts as
//! an exchange failure ([`TransientError::StoreTimeout`]), never as a missing credential.

mod metrics;

pub use metrics::ResolveMetrics;

// self
use crate::{
	_prelude::*,
	auth::{AccessCredential, TokenSecret, UserId},
	cache::CacheEntry,
	error::TransientError,
	lifecycle::{CredentialManager, common},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::{CompareAndSwapOutcome, IdentityRecord, StoreFuture},
};

impl CredentialManager {
	/// Returns a currently valid access credential for `user`.
	///
	/// Fails with [`Error::Unauthenticated`] when no refresh token is known for the user or
	/// when the refresh exchange fails (the failure is kept as the error's source), and with
	/// [`Error::Storage`] when the identity store cannot be read.
	pub async fn resolve_access_token(&self, user: &UserId) -> Result<AccessCredential> {
		const KIND: FlowKind = FlowKind::Resolve;

		if let Some(access) = self.cached_access(user, OffsetDateTime::now_utc()) {
			self.metrics.record_cache_hit();

			return Ok(access);
		}

		let span = FlowSpan::new(KIND, "resolve_access_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.resolve_guarded(user)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(err) => {
				self.metrics.record_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				obs::warn_flow_failure(KIND, Some(user), err);
			},
		}

		result
	}

	fn cached_access(&self, user: &UserId, now: OffsetDateTime) -> Option<AccessCredential> {
		self.cache.get(user).and_then(|entry| entry.valid_access_at(now).cloned())
	}

	async fn resolve_guarded(&self, user: &UserId) -> Result<AccessCredential> {
		let guard = common::flow_guard(self, user);
		let _singleflight = guard.lock().await;
		let refresh_token = match self.cache.get(user) {
			Some(entry) => {
				// Another caller may have refreshed while this one waited on the guard.
				if let Some(access) = entry.valid_access_at(OffsetDateTime::now_utc()) {
					self.metrics.record_cache_hit();

					return Ok(access.clone());
				}

				entry.refresh_token
			},
			None => {
				self.metrics.record_store_load();

				match self.store_call("find", self.store.find(user)).await? {
					Some(record) => record.refresh_token,
					None => return Err(Error::unauthenticated(user.clone())),
				}
			},
		};

		self.refresh(user, refresh_token).await
	}

	async fn refresh(&self, user: &UserId, refresh_token: TokenSecret) -> Result<AccessCredential> {
		self.metrics.record_refresh();

		let issued_at = OffsetDateTime::now_utc();
		let grant = match self.exchange.exchange_refresh_token(&refresh_token).await {
			Ok(grant) => grant,
			Err(err) => {
				self.cache.remove(user);

				if err.is_rejection() {
					self.discard_rejected(user, &refresh_token).await;
				}

				return Err(Error::unauthenticated_by(user.clone(), err));
			},
		};
		let access = grant.access_credential(issued_at);
		let refresh_token = match grant.refresh_token {
			Some(rotated) if rotated != refresh_token =>
				self.persist_rotation(user, &refresh_token, rotated).await?,
			_ => refresh_token,
		};

		self.cache.put(CacheEntry::new(user.clone(), refresh_token, access.clone()));

		Ok(access)
	}

	async fn persist_rotation(
		&self,
		user: &UserId,
		previous: &TokenSecret,
		rotated: TokenSecret,
	) -> Result<TokenSecret> {
		let record = IdentityRecord::new(user.clone(), rotated.clone());
		let outcome = self
			.store_call(
				"compare_and_swap",
				self.store.compare_and_swap(user, previous.expose(), Some(record.clone())),
			)
			.await?;

		match outcome {
			CompareAndSwapOutcome::Updated => Ok(rotated),
			CompareAndSwapOutcome::Missing => {
				self.store_call("upsert", self.store.upsert(record)).await?;

				Ok(rotated)
			},
			// A re-authorization committed a newer token; the store wins.
			CompareAndSwapOutcome::RefreshMismatch => {
				let current = self.store_call("find", self.store.find(user)).await?;

				match current {
					Some(current) => Ok(current.refresh_token),
					None => {
						self.store_call("upsert", self.store.upsert(record)).await?;

						Ok(rotated)
					},
				}
			},
		}
	}

	async fn discard_rejected(&self, user: &UserId, rejected: &TokenSecret) {
		let call = self.store.compare_and_swap(user, rejected.expose(), None);

		if let Err(err) = self.store_call("compare_and_swap", call).await {
			obs::warn_flow_failure(FlowKind::Resolve, Some(user), &err);
		}
	}

	async fn store_call<T>(&self, operation: &'static str, call: StoreFuture<'_, T>) -> Result<T> {
		match common::bounded_store_call(self.store_timeout, call).await {
			Ok(outcome) => outcome.map_err(Error::from),
			Err(timeout) => Err(TransientError::StoreTimeout { operation, timeout }.into()),
		}
	}
}
