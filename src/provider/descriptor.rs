//! Provider descriptor data structures shared by the exchange client and the authorize URL
//! builder.

/// Builder API for assembling provider descriptors.
pub mod builder;
/// Upstream call labels.
pub mod exchange;
/// Provider-specific quirk toggles.
pub mod quirks;

pub use builder::*;
pub use exchange::*;
pub use quirks::*;

// self
use crate::_prelude::*;

/// Preferred client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Authorization endpoint the end user is redirected to.
	pub authorization: Url,
	/// Token endpoint used for code exchanges and refreshes.
	pub token: Url,
	/// Endpoint returning the authenticated user's profile (`{"id": ...}`).
	pub identity: Url,
}

/// Immutable provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Short label naming the provider in logs and errors.
	pub id: String,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Preferred client authentication mechanism.
	pub preferred_client_auth_method: ClientAuthMethod,
	/// Provider-specific quirks.
	pub quirks: ProviderQuirks,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: impl Into<String>) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(id)
	}

	/// Descriptor for the Spotify accounts service and Web API.
	pub fn spotify() -> Result<Self, ProviderDescriptorError> {
		Self::builder("spotify")
			.authorization_endpoint(parse_static("https://accounts.spotify.com/authorize")?)
			.token_endpoint(parse_static("https://accounts.spotify.com/api/token")?)
			.identity_endpoint(parse_static("https://api.spotify.com/v1/me")?)
			.preferred_client_auth_method(ClientAuthMethod::ClientSecretBasic)
			.build()
	}
}

fn parse_static(value: &'static str) -> Result<Url, ProviderDescriptorError> {
	Url::parse(value).map_err(|_| ProviderDescriptorError::InvalidUrl { url: value.into() })
}
