// self
use crate::_prelude::*;

/// Upstream calls performed by the token exchange client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeKind {
	/// `grant_type=authorization_code` token request.
	AuthorizationCode,
	/// `grant_type=refresh_token` token request.
	RefreshToken,
	/// Bearer-authenticated identity lookup.
	Identity,
}
impl ExchangeKind {
	/// Returns a stable label (the RFC 6749 grant identifier for token requests).
	pub fn as_str(self) -> &'static str {
		match self {
			ExchangeKind::AuthorizationCode => "authorization_code",
			ExchangeKind::RefreshToken => "refresh_token",
			ExchangeKind::Identity => "identity",
		}
	}

	/// Returns `true` for calls made against the token endpoint.
	pub fn is_token_request(self) -> bool {
		!matches!(self, ExchangeKind::Identity)
	}
}
impl Display for ExchangeKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
