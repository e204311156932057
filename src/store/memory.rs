//! Thread-safe in-memory [`IdentityStore`] for local development, tests, and single-instance
//! deployments that accept losing authorizations on restart.

// self
use crate::{
	_prelude::*,
	auth::UserId,
	store::{
		CompareAndSwapOutcome, IdentityRecord, IdentityStore, StoreError, StoreFuture, swap_in_map,
	},
};

type StoreMap = Arc<RwLock<HashMap<UserId, IdentityRecord>>>;

/// Storage backend that keeps identity records in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Number of users with a stored refresh token.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when no user is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn upsert_now(map: StoreMap, record: IdentityRecord) -> Result<(), StoreError> {
		map.write().insert(record.user.clone(), record);

		Ok(())
	}
}
impl IdentityStore for MemoryStore {
	fn find<'a>(&'a self, user: &'a UserId) -> StoreFuture<'a, Option<IdentityRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(user).cloned()) })
	}

	fn upsert(&self, record: IdentityRecord) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::upsert_now(map, record) })
	}

	fn compare_and_swap<'a>(
		&'a self,
		user: &'a UserId,
		expected_refresh: &'a str,
		replacement: Option<IdentityRecord>,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		let map = self.0.clone();

		Box::pin(async move {
			let mut guard = map.write();

			Ok(swap_in_map(&mut guard, user, expected_refresh, replacement))
		})
	}
}
