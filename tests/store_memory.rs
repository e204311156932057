// crates.io
use time::macros;
// self
use lastplayed_broker::{
	auth::{TokenSecret, UserId},
	store::{CompareAndSwapOutcome, IdentityRecord, IdentityStore, MemoryStore},
};

fn user(id: &str) -> UserId {
	UserId::new(id).expect("Failed to build user identifier for memory store tests.")
}

fn record(user: &UserId, refresh: &str) -> IdentityRecord {
	IdentityRecord {
		user: user.clone(),
		refresh_token: TokenSecret::new(refresh),
		updated_at: macros::datetime!(2025-11-10 12:00 UTC),
	}
}

#[tokio::test]
async fn upserts_replace_instead_of_appending() {
	let store = MemoryStore::default();
	let listener = user("listener-1");

	store.upsert(record(&listener, "refresh-1")).await.expect("First upsert should succeed.");
	store.upsert(record(&listener, "refresh-2")).await.expect("Second upsert should succeed.");

	let fetched = store
		.find(&listener)
		.await
		.expect("Lookup should succeed.")
		.expect("Upserted record should be present.");

	assert_eq!(store.len(), 1);
	assert_eq!(fetched.refresh_token.expose(), "refresh-2");
	assert!(store.find(&user("someone-else")).await.expect("Lookup should succeed.").is_none());
}

#[tokio::test]
async fn compare_and_swap_respects_the_expected_token() {
	let store = MemoryStore::default();
	let listener = user("listener-cas");

	assert_eq!(
		store
			.compare_and_swap(&listener, "refresh-1", Some(record(&listener, "refresh-2")))
			.await
			.expect("CAS on an empty store should succeed."),
		CompareAndSwapOutcome::Missing
	);

	store.upsert(record(&listener, "refresh-1")).await.expect("Seeding should succeed.");

	assert_eq!(
		store
			.compare_and_swap(&listener, "stale", Some(record(&listener, "refresh-x")))
			.await
			.expect("Mismatched CAS should succeed."),
		CompareAndSwapOutcome::RefreshMismatch
	);
	assert_eq!(
		store
			.compare_and_swap(&listener, "refresh-1", Some(record(&listener, "refresh-2")))
			.await
			.expect("Matching CAS should succeed."),
		CompareAndSwapOutcome::Updated
	);

	let fetched = store
		.find(&listener)
		.await
		.expect("Lookup should succeed.")
		.expect("Rotated record should be present.");

	assert_eq!(fetched.refresh_token.expose(), "refresh-2");
	assert_eq!(
		store
			.compare_and_swap(&listener, "refresh-2", None)
			.await
			.expect("Deleting CAS should succeed."),
		CompareAndSwapOutcome::Updated
	);
	assert!(store.is_empty());
}

#[tokio::test]
async fn clones_share_state() {
	let store = MemoryStore::default();
	let clone = store.clone();
	let listener = user("listener-shared");

	clone.upsert(record(&listener, "refresh-shared")).await.expect("Upsert should succeed.");

	assert!(store.find(&listener).await.expect("Lookup should succeed.").is_some());
}
