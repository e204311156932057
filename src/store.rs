//! Durable identity store contract and built-in backends.
//!
//! The store is the source of truth for refresh tokens: exactly one [`IdentityRecord`] per
//! [`UserId`], replaced (never appended) on every re-authorization.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, UserId},
};

/// Boxed future returned by [`IdentityStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for long-lived refresh credentials.
///
/// The lifecycle manager races every call against its store timeout, so a backend that stops
/// answering cannot stall a user's flow indefinitely.
pub trait IdentityStore
where
	Self: Send + Sync,
{
	/// Fetches the record stored for `user`, if present.
	fn find<'a>(&'a self, user: &'a UserId) -> StoreFuture<'a, Option<IdentityRecord>>;

	/// Inserts or replaces the record keyed by `record.user`.
	fn upsert(&self, record: IdentityRecord) -> StoreFuture<'_, ()>;

	/// Atomically replaces (or deletes, when `replacement` is `None`) the record for `user` if
	/// its refresh token still equals `expected_refresh`.
	fn compare_and_swap<'a>(
		&'a self,
		user: &'a UserId,
		expected_refresh: &'a str,
		replacement: Option<IdentityRecord>,
	) -> StoreFuture<'a, CompareAndSwapOutcome>;
}

/// Durable row: one refresh token per user.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
	/// Owner of the refresh token.
	pub user: UserId,
	/// Long-lived refresh credential.
	pub refresh_token: TokenSecret,
	/// Instant the record was last written.
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
}
impl IdentityRecord {
	/// Builds a record stamped with the current UTC instant.
	pub fn new(user: UserId, refresh_token: TokenSecret) -> Self {
		Self { user, refresh_token, updated_at: OffsetDateTime::now_utc() }
	}
}
impl Debug for IdentityRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdentityRecord")
			.field("user", &self.user)
			.field("refresh_token", &"<redacted>")
			.field("updated_at", &self.updated_at)
			.finish()
	}
}

/// Result of a refresh-token compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The refresh token matched and the record was replaced or deleted.
	Updated,
	/// The record exists but holds a different refresh token.
	RefreshMismatch,
	/// No record exists for the user.
	Missing,
}

/// Error type produced by [`IdentityStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

impl StoreError {
	/// Backend failure reported when a store call exceeds `timeout`.
	pub fn timed_out(operation: &str, timeout: std::time::Duration) -> Self {
		Self::Backend {
			message: format!("`{operation}` did not complete within {} ms", timeout.as_millis()),
		}
	}
}

/// Shared CAS decision used by the built-in backends.
pub(crate) fn swap_in_map(
	map: &mut HashMap<UserId, IdentityRecord>,
	user: &UserId,
	expected_refresh: &str,
	replacement: Option<IdentityRecord>,
) -> CompareAndSwapOutcome {
	let outcome = match map.get(user) {
		Some(existing) if existing.refresh_token.expose() == expected_refresh =>
			CompareAndSwapOutcome::Updated,
		Some(_) => CompareAndSwapOutcome::RefreshMismatch,
		None => CompareAndSwapOutcome::Missing,
	};

	if matches!(outcome, CompareAndSwapOutcome::Updated) {
		match replacement {
			Some(record) => {
				map.insert(user.clone(), record);
			},
			None => {
				map.remove(user);
			},
		}
	}

	outcome
}
