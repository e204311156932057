//! Token exchange client: the narrow upstream contract consumed by the lifecycle manager.
//!
//! [`TokenExchangeClient`] covers the three upstream calls the manager needs (code exchange,
//! refresh exchange, identity lookup). [`OAuth2ExchangeClient`] implements it on top of the
//! `oauth2` crate and any [`TokenHttpClient`] transport.

pub use oauth2;

// std
use std::{borrow::Cow, collections::BTreeMap};
// crates.io
use oauth2::{
	AsyncHttpClient, AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet,
	EndpointSet, HttpClientError, RedirectUrl, RefreshToken, RequestTokenError, TokenResponse,
	TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
	http::{
		Method, Request,
		header::{ACCEPT, AUTHORIZATION},
	},
};
// self
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;
use crate::{
	_prelude::*,
	auth::{AccessCredential, TokenSecret, UserId},
	error::{ConfigError, TransientError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	provider::{
		ClientAuthMethod, ExchangeKind, ProviderDescriptor, ProviderErrorContext,
		ProviderErrorKind, ProviderStrategy,
	},
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Boxed future returned by [`TokenExchangeClient`] operations.
pub type ExchangeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

#[cfg(feature = "reqwest")]
/// Exchange client specialized for the crate's default reqwest transport stack.
pub type ReqwestExchangeClient = OAuth2ExchangeClient<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Credentials returned by a token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
	/// Newly issued access token.
	pub access_token: TokenSecret,
	/// Refresh token, when upstream issued (or rotated) one.
	pub refresh_token: Option<TokenSecret>,
	/// Lifetime of the access token as reported by upstream; always positive.
	pub expires_in: Duration,
}
impl TokenGrant {
	/// Converts the grant into an access credential issued at `issued_at`.
	pub fn access_credential(&self, issued_at: OffsetDateTime) -> AccessCredential {
		AccessCredential::issued(self.access_token.clone(), issued_at, self.expires_in)
	}
}
impl Debug for TokenGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenGrant")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_in", &self.expires_in)
			.finish()
	}
}

/// Upstream contract consumed by the lifecycle manager.
///
/// Each call is attempted once; failures are classified into broker [`Error`] values and
/// never retried here.
pub trait TokenExchangeClient
where
	Self: Send + Sync,
{
	/// Trades an authorization code for a grant; `redirect_uri` must match the authorize call.
	fn exchange_authorization_code<'a>(
		&'a self,
		code: &'a str,
		redirect_uri: &'a Url,
	) -> ExchangeFuture<'a, TokenGrant>;

	/// Trades a refresh token for a new access token (and possibly a rotated refresh token).
	fn exchange_refresh_token<'a>(
		&'a self,
		refresh_token: &'a TokenSecret,
	) -> ExchangeFuture<'a, TokenGrant>;

	/// Resolves the user who owns `access`.
	fn fetch_identity<'a>(&'a self, access: &'a AccessCredential) -> ExchangeFuture<'a, UserId>;
}

/// Maps HTTP transport failures into broker [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a broker error.
	fn map_transport_error(
		&self,
		strategy: &dyn ProviderStrategy,
		exchange: ExchangeKind,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		_strategy: &dyn ProviderStrategy,
		_exchange: ExchangeKind,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => transient(
				format!("HTTP client error occurred while calling upstream: {message}"),
				meta,
			),
			_ => transient("HTTP client error occurred while calling upstream".into(), meta),
		}
	}
}

/// [`TokenExchangeClient`] backed by the `oauth2` crate.
pub struct OAuth2ExchangeClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	identity_endpoint: Url,
	strategy: Arc<dyn ProviderStrategy>,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> OAuth2ExchangeClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds a client for `descriptor` authenticating as `client_id`/`client_secret`.
	pub fn from_descriptor(
		descriptor: &ProviderDescriptor,
		client_id: &str,
		client_secret: Option<&str>,
		strategy: Arc<dyn ProviderStrategy>,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(descriptor.endpoints.authorization.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let mut oauth_client = BasicClient::new(ClientId::new(client_id.to_owned()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url);

		if let Some(secret) = client_secret {
			oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret.to_owned()));
		}
		if matches!(descriptor.preferred_client_auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self {
			oauth_client,
			identity_endpoint: descriptor.endpoints.identity.clone(),
			strategy,
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		})
	}

	fn extra_params(&self, exchange: ExchangeKind) -> BTreeMap<String, String> {
		let mut form = BTreeMap::new();

		self.strategy.augment_token_request(exchange, &mut form);

		form
	}

	fn map_request_error(
		&self,
		exchange: ExchangeKind,
		meta: Option<ResponseMetadata>,
		err: BasicRequestTokenError<HttpClientError<C::TransportError>>,
	) -> Error {
		let meta_ref = meta.as_ref();

		match err {
			RequestTokenError::ServerResponse(response) =>
				map_server_response_error(self.strategy.as_ref(), exchange, response, meta_ref),
			RequestTokenError::Request(error) => self.error_mapper.map_transport_error(
				self.strategy.as_ref(),
				exchange,
				meta_ref,
				error,
			),
			RequestTokenError::Parse(error, _body) =>
				TransientError::ResponseParse { source: error, status: meta_status(meta_ref) }
					.into(),
			RequestTokenError::Other(message) =>
				transient(format!("Token endpoint returned an unexpected response: {message}"), meta_ref),
		}
	}
}
impl<C, M> TokenExchangeClient for OAuth2ExchangeClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn exchange_authorization_code<'a>(
		&'a self,
		code: &'a str,
		redirect_uri: &'a Url,
	) -> ExchangeFuture<'a, TokenGrant> {
		const KIND: ExchangeKind = ExchangeKind::AuthorizationCode;

		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let redirect_url = RedirectUrl::new(redirect_uri.to_string())
				.map_err(|source| ConfigError::InvalidRedirect { source })?;
			let mut request = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_redirect_uri(Cow::Owned(redirect_url));

			for (key, value) in self.extra_params(KIND) {
				request = request.add_extra_param(key, value);
			}

			let response = request
				.request_async(&instrumented)
				.await
				.map_err(|err| self.map_request_error(KIND, meta.take(), err))?;

			map_token_response(response)
		})
	}

	fn exchange_refresh_token<'a>(
		&'a self,
		refresh_token: &'a TokenSecret,
	) -> ExchangeFuture<'a, TokenGrant> {
		const KIND: ExchangeKind = ExchangeKind::RefreshToken;

		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let refresh_secret = RefreshToken::new(refresh_token.expose().to_owned());
			let mut request = self.oauth_client.exchange_refresh_token(&refresh_secret);

			for (key, value) in self.extra_params(KIND) {
				request = request.add_extra_param(key, value);
			}

			let response = request
				.request_async(&instrumented)
				.await
				.map_err(|err| self.map_request_error(KIND, meta.take(), err))?;

			map_token_response(response)
		})
	}

	fn fetch_identity<'a>(&'a self, access: &'a AccessCredential) -> ExchangeFuture<'a, UserId> {
		const KIND: ExchangeKind = ExchangeKind::Identity;

		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let handle = self.http_client.with_metadata(meta.clone());
			let request = Request::builder()
				.method(Method::GET)
				.uri(self.identity_endpoint.as_str())
				.header(AUTHORIZATION, access.token.bearer_header())
				.header(ACCEPT, "application/json")
				.body(Vec::new())
				.map_err(ConfigError::from)?;
			let response = handle.call(request).await.map_err(|err| {
				self.error_mapper.map_transport_error(
					self.strategy.as_ref(),
					KIND,
					meta.take().as_ref(),
					err,
				)
			})?;
			let status = response.status().as_u16();

			if !response.status().is_success() {
				let ctx = ProviderErrorContext::new(KIND)
					.with_http_status(status)
					.with_body_preview(String::from_utf8_lossy(response.body()).into_owned());
				let message = format!("Identity endpoint answered with HTTP {status}");

				return Err(classified_error(
					self.strategy.classify_error(&ctx),
					message,
					meta.take().as_ref(),
				));
			}

			let mut de = serde_json::Deserializer::from_slice(response.body());
			let profile: IdentityProfile = serde_path_to_error::deserialize(&mut de)
				.map_err(|source| TransientError::ResponseParse { source, status: Some(status) })?;

			let user = UserId::new(profile.id).map_err(ConfigError::from)?;

			Ok(user)
		})
	}
}
impl<C, M> Debug for OAuth2ExchangeClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuth2ExchangeClient")
			.field("client_id", self.oauth_client.client_id())
			.field("token_endpoint", &self.oauth_client.token_uri().as_str())
			.field("identity_endpoint", &self.identity_endpoint.as_str())
			.finish()
	}
}

#[derive(Deserialize)]
struct IdentityProfile {
	id: String,
}

fn map_token_response(response: BasicTokenResponse) -> Result<TokenGrant> {
	let expires_in = response.expires_in().ok_or(ConfigError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| ConfigError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(ConfigError::NonPositiveExpiresIn.into());
	}

	Ok(TokenGrant {
		access_token: TokenSecret::new(response.access_token().secret().to_owned()),
		refresh_token: response.refresh_token().map(|token| TokenSecret::new(token.secret().to_owned())),
		expires_in: Duration::seconds(expires_in),
	})
}

fn map_server_response_error(
	strategy: &dyn ProviderStrategy,
	exchange: ExchangeKind,
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let mut ctx = ProviderErrorContext::new(exchange)
		.with_oauth_error(response.error().as_ref().to_string());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.clone());
	}
	if let Some(status) = meta_status(meta) {
		ctx = ctx.with_http_status(status);
	}

	let message = match response.error_description() {
		Some(description) => format!("Token endpoint returned an OAuth error: {description}"),
		None => format!("Token endpoint returned an OAuth error: {}", response.error().as_ref()),
	};

	classified_error(strategy.classify_error(&ctx), message, meta)
}

fn classified_error(
	kind: ProviderErrorKind,
	message: String,
	meta: Option<&ResponseMetadata>,
) -> Error {
	match kind {
		ProviderErrorKind::InvalidGrant => Error::InvalidGrant { reason: message },
		ProviderErrorKind::InvalidClient => Error::InvalidClient { reason: message },
		ProviderErrorKind::InsufficientScope => Error::InsufficientScope { reason: message },
		ProviderErrorKind::Transient => transient(message, meta),
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(meta: Option<&ResponseMetadata>, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::UpstreamEndpoint {
			message: "Request timed out while calling upstream".into(),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		}
		.into();
	}

	TransportError::from(err).into()
}

fn transient(message: String, meta: Option<&ResponseMetadata>) -> Error {
	TransientError::UpstreamEndpoint {
		message,
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
	.into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
