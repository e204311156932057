//! In-process credential cache keyed by [`UserId`].
//!
//! The cache is a performance layer over the identity store plus the token exchange: losing
//! an entry only costs one store read and one refresh exchange. Lookups never check expiry;
//! that decision belongs to the lifecycle manager.

// self
use crate::{
	_prelude::*,
	auth::{AccessCredential, TokenSecret, UserId},
};

type CacheMap = Arc<RwLock<HashMap<UserId, CacheEntry>>>;

/// Working copy of a user's credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct CacheEntry {
	/// Owner of the credentials.
	pub user: UserId,
	/// Refresh token mirrored from the identity store.
	pub refresh_token: TokenSecret,
	/// Most recently issued access credential.
	pub access: AccessCredential,
}
impl CacheEntry {
	/// Bundles a user's refresh token with a freshly issued access credential.
	pub fn new(user: UserId, refresh_token: TokenSecret, access: AccessCredential) -> Self {
		Self { user, refresh_token, access }
	}

	/// Returns the access credential when it is still usable at `now`.
	pub fn valid_access_at(&self, now: OffsetDateTime) -> Option<&AccessCredential> {
		(!self.access.is_expired_at(now)).then_some(&self.access)
	}
}
impl Debug for CacheEntry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CacheEntry")
			.field("user", &self.user)
			.field("refresh_token", &"<redacted>")
			.field("access", &self.access)
			.finish()
	}
}

/// Thread-safe map from user to [`CacheEntry`], optionally bounded.
///
/// Clones share the same underlying map. Every cache carries a grace period: entries whose
/// access credential expired longer ago than that are dropped by
/// [`CredentialCache::purge_expired`] and, on bounded caches, before any eviction.
#[derive(Clone, Debug)]
pub struct CredentialCache {
	entries: CacheMap,
	capacity: Option<usize>,
	grace: Duration,
}
impl CredentialCache {
	/// Grace period used until [`CredentialCache::with_grace`] overrides it.
	pub const DEFAULT_GRACE: Duration = Duration::minutes(5);

	/// Creates an unbounded cache.
	pub fn unbounded() -> Self {
		Self::default()
	}

	/// Creates a cache that holds at most `capacity` users.
	///
	/// Inserting a new user into a full cache first drops entries expired for longer than the
	/// grace period, then evicts the entry whose access credential expires soonest.
	pub fn bounded(capacity: usize) -> Self {
		Self { capacity: Some(capacity.max(1)), ..Self::default() }
	}

	/// Overrides the grace period; negative values clamp to zero.
	pub fn with_grace(mut self, grace: Duration) -> Self {
		self.grace = if grace.is_negative() { Duration::ZERO } else { grace };

		self
	}

	/// Grace period applied when purging.
	pub fn grace(&self) -> Duration {
		self.grace
	}

	/// Returns a copy of the entry for `user`, expired or not.
	pub fn get(&self, user: &UserId) -> Option<CacheEntry> {
		self.entries.read().get(user).cloned()
	}

	/// Inserts or overwrites the entry for `entry.user`.
	pub fn put(&self, entry: CacheEntry) {
		let mut guard = self.entries.write();

		let full = self
			.capacity
			.filter(|capacity| !guard.contains_key(&entry.user) && guard.len() >= *capacity);

		if let Some(capacity) = full {
			make_room(&mut guard, capacity, OffsetDateTime::now_utc() - self.grace);
		}

		guard.insert(entry.user.clone(), entry);
	}

	/// Drops the entry for `user`, returning it if present.
	pub fn remove(&self, user: &UserId) -> Option<CacheEntry> {
		self.entries.write().remove(user)
	}

	/// Drops every entry whose access credential expired more than the grace period before
	/// `now`.
	///
	/// Returns the number of removed entries.
	pub fn purge_expired(&self, now: OffsetDateTime) -> usize {
		let mut guard = self.entries.write();
		let before = guard.len();
		let cutoff = now - self.grace;

		guard.retain(|_, entry| !entry.access.is_expired_at(cutoff));

		before - guard.len()
	}

	/// Number of cached users.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns `true` when nothing is cached.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}
}

impl Default for CredentialCache {
	fn default() -> Self {
		Self { entries: Default::default(), capacity: None, grace: Self::DEFAULT_GRACE }
	}
}

fn make_room(map: &mut HashMap<UserId, CacheEntry>, capacity: usize, cutoff: OffsetDateTime) {
	map.retain(|_, entry| !entry.access.is_expired_at(cutoff));

	while map.len() >= capacity {
		let Some(victim) =
			map.values().min_by_key(|entry| entry.access.expires_at).map(|entry| entry.user.clone())
		else {
			break;
		};

		map.remove(&victim);
	}
}
