//! End-user identifier shared by the cache, the identity store, and identity lookups.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

/// Upstream-assigned identifier of an end user; keys both the cache and the store.
///
/// The value is opaque. Validation only rejects strings the identity endpoint could not have
/// produced, so a malformed id never reaches the store as a primary key.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);
impl UserId {
	/// Longest accepted identifier, in bytes.
	pub const MAX_LEN: usize = 128;

	/// Validates and wraps `value`.
	pub fn new(value: impl Into<String>) -> Result<Self, UserIdError> {
		Self::try_from(value.into())
	}
}
impl TryFrom<String> for UserId {
	type Error = UserIdError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		if value.is_empty() {
			return Err(UserIdError::Empty);
		}
		if let Some(position) = value.find(char::is_whitespace) {
			return Err(UserIdError::Whitespace { position });
		}
		if value.len() > Self::MAX_LEN {
			return Err(UserIdError::TooLong { len: value.len() });
		}

		Ok(Self(value))
	}
}
impl From<UserId> for String {
	fn from(value: UserId) -> Self {
		value.0
	}
}
impl FromStr for UserId {
	type Err = UserIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl Deref for UserId {
	type Target = str;

	fn deref(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for UserId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for UserId {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl Debug for UserId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "UserId({})", self.0)
	}
}
impl Display for UserId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Reasons a string is not a usable [`UserId`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum UserIdError {
	/// Nothing was supplied.
	#[error("User identifier cannot be empty.")]
	Empty,
	/// The value contains whitespace.
	#[error("User identifier contains whitespace at byte {position}.")]
	Whitespace {
		/// Byte offset of the first whitespace character.
		position: usize,
	},
	/// The value is longer than [`UserId::MAX_LEN`].
	#[error("User identifier is {len} bytes long; at most {} are allowed.", UserId::MAX_LEN)]
	TooLong {
		/// Length of the rejected value in bytes.
		len: usize,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn blank_and_padded_values_are_rejected() {
		assert_eq!(UserId::new(""), Err(UserIdError::Empty));
		assert_eq!(UserId::new(" listener"), Err(UserIdError::Whitespace { position: 0 }));
		assert_eq!(UserId::new("listener\t"), Err(UserIdError::Whitespace { position: 8 }));

		let user = UserId::new("31l5ifmhcjvyxcp").expect("Spotify-style user id should be valid.");

		assert_eq!(user.as_ref(), "31l5ifmhcjvyxcp");
		assert_eq!(format!("{user:?}"), "UserId(31l5ifmhcjvyxcp)");
	}

	#[test]
	fn deserialization_enforces_validation() {
		let user: UserId =
			serde_json::from_str("\"listener-42\"").expect("User should deserialize successfully.");

		assert_eq!(&*user, "listener-42");
		assert!(serde_json::from_str::<UserId>("\"with space\"").is_err());
		assert!(serde_json::from_str::<UserId>("\"\"").is_err());
	}

	#[test]
	fn length_limit_is_inclusive() {
		UserId::new("a".repeat(UserId::MAX_LEN)).expect("Exact length should succeed.");

		assert_eq!(
			UserId::new("a".repeat(UserId::MAX_LEN + 1)),
			Err(UserIdError::TooLong { len: UserId::MAX_LEN + 1 })
		);
	}

	#[test]
	fn borrow_supports_lookup_by_str() {
		let map: HashMap<UserId, u8> = HashMap::from_iter([(
			UserId::new("listener-7").expect("User used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("listener-7"), Some(&7));
	}
}
