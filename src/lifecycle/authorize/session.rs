// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	lifecycle::{AuthorizationSettings, common},
};

const STATE_LEN: usize = 32;

/// Authorization handshake returned by [`CredentialManager::start_authorization`].
///
/// The route layer keeps the session (typically in a cookie or server-side map) between the
/// redirect and the callback, then checks the returned `state` with
/// [`AuthorizationSession::validate_state`].
///
/// [`CredentialManager::start_authorization`]: crate::lifecycle::CredentialManager::start_authorization
#[derive(Clone, Debug)]
pub struct AuthorizationSession {
	/// Opaque value that must round-trip through the provider redirect.
	pub state: String,
	/// Redirect URI embedded in the authorize URL.
	pub redirect_uri: Url,
	/// Fully-formed authorize URL the end user is sent to.
	pub authorize_url: Url,
}
impl AuthorizationSession {
	/// Validates the `state` parameter returned to the callback.
	pub fn validate_state(&self, returned_state: &str) -> Result<()> {
		if returned_state == self.state {
			Ok(())
		} else {
			Err(Error::InvalidGrant { reason: "Authorization state mismatch.".into() })
		}
	}
}

pub(super) fn build_session(settings: &AuthorizationSettings) -> AuthorizationSession {
	let state = random_string(STATE_LEN);
	let authorize_url = build_authorize_url(settings, &state);

	AuthorizationSession { state, redirect_uri: settings.redirect_uri.clone(), authorize_url }
}

fn build_authorize_url(settings: &AuthorizationSettings, state: &str) -> Url {
	let mut url = settings.authorization_endpoint.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", &settings.client_id);
	pairs.append_pair("redirect_uri", settings.redirect_uri.as_str());

	if let Some(scope) = common::format_scope(&settings.scopes, settings.scope_delimiter) {
		pairs.append_pair("scope", &scope);
	}

	pairs.append_pair("state", state);

	if settings.show_dialog {
		pairs.append_pair("show_dialog", "true");
	}

	drop(pairs);

	url
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}
