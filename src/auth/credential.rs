//! Short-lived access credentials and their expiry arithmetic.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Lifecycle status of an access credential at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialStatus {
	/// The credential can be presented upstream.
	Active,
	/// The credential reached its upstream expiry.
	Expired,
}

/// Bearer token plus the absolute instant upstream said it stops working.
///
/// `expires_at` is fixed at issuance (`issued_at + expires_in`) and never adjusted afterwards.
/// Access credentials live only in memory; they are cheap to mint again from a refresh token.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessCredential {
	/// Access token secret; callers must avoid logging it.
	pub token: TokenSecret,
	/// Instant the exchange completed.
	pub issued_at: OffsetDateTime,
	/// Upstream expiry instant.
	pub expires_at: OffsetDateTime,
}
impl AccessCredential {
	/// Creates a credential that expires `expires_in` after `issued_at`.
	pub fn issued(token: TokenSecret, issued_at: OffsetDateTime, expires_in: Duration) -> Self {
		Self { token, issued_at, expires_at: issued_at + expires_in }
	}

	/// Creates a credential issued at the current UTC instant.
	pub fn issued_now(token: TokenSecret, expires_in: Duration) -> Self {
		Self::issued(token, OffsetDateTime::now_utc(), expires_in)
	}

	/// Computes the lifecycle status at `instant`.
	pub fn status_at(&self, instant: OffsetDateTime) -> CredentialStatus {
		if instant >= self.expires_at { CredentialStatus::Expired } else { CredentialStatus::Active }
	}

	/// Returns `true` once `instant` reached the expiry.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), CredentialStatus::Expired)
	}

	/// Returns `true` if the credential is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Time left before expiry, clamped at zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}
}
impl Debug for AccessCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessCredential")
			.field("token", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
