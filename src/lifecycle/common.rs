// crates.io
use futures_timer::Delay;
use futures_util::future::{self, Either};
// self
use crate::{
	_prelude::*,
	auth::UserId,
	lifecycle::CredentialManager,
	store::{StoreError, StoreFuture},
};

/// Returns (and creates on demand) the single-flight guard for `user`.
///
/// Guards no caller holds any more are pruned on the way in, so the map tracks only users
/// with a flow in progress.
pub(crate) fn flow_guard(manager: &CredentialManager, user: &UserId) -> Arc<AsyncMutex<()>> {
	let mut guards = manager.flow_guards.lock();

	guards.retain(|_, guard| Arc::strong_count(guard) > 1);
	guards.entry(user.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
}

/// Races a store call against `timeout`.
///
/// The outer `Err` means the call was abandoned; the store future is dropped with it.
pub(crate) async fn bounded_store_call<T>(
	timeout: std::time::Duration,
	call: StoreFuture<'_, T>,
) -> Result<Result<T, StoreError>, std::time::Duration> {
	match future::select(call, Delay::new(timeout)).await {
		Either::Left((outcome, _)) => Ok(outcome),
		Either::Right(_) => Err(timeout),
	}
}

/// Joins scopes with the provider's delimiter for the authorize URL.
pub(crate) fn format_scope(scopes: &[String], delimiter: char) -> Option<String> {
	if scopes.is_empty() {
		return None;
	}

	let mut buf = String::new();

	for (idx, value) in scopes.iter().enumerate() {
		if idx > 0 {
			buf.push(delimiter);
		}

		buf.push_str(value);
	}

	Some(buf)
}
