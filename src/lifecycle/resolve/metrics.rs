// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing resolve traffic.
#[derive(Debug, Default)]
pub struct ResolveMetrics {
	cache_hits: AtomicU64,
	store_loads: AtomicU64,
	refreshes: AtomicU64,
	failures: AtomicU64,
}
impl ResolveMetrics {
	/// Resolves answered from a valid cache entry.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Identity store lookups after a cache miss.
	pub fn store_loads(&self) -> u64 {
		self.store_loads.load(Ordering::Relaxed)
	}

	/// Refresh exchanges sent upstream.
	pub fn refreshes(&self) -> u64 {
		self.refreshes.load(Ordering::Relaxed)
	}

	/// Resolves that returned an error.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_store_load(&self) {
		self.store_loads.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh(&self) {
		self.refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
