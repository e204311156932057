//! Process configuration read once at startup.

// self
use crate::{_prelude::*, error::ConfigError};

/// Immutable broker configuration.
#[derive(Clone)]
pub struct BrokerConfig {
	/// OAuth client identifier registered with the provider.
	pub client_id: String,
	/// OAuth client secret registered with the provider.
	pub client_secret: String,
	/// Externally reachable base URI of the badge service.
	pub base_uri: Url,
	/// Path of the authorization callback, joined onto `base_uri`.
	pub callback_path: String,
	/// Scopes requested during authorization.
	pub scopes: Vec<String>,
	/// Per-request timeout applied to upstream calls.
	pub http_timeout: std::time::Duration,
	/// Bound on each identity store call; defaults to `http_timeout`.
	pub store_timeout: std::time::Duration,
}
impl BrokerConfig {
	/// Default authorization callback path.
	pub const DEFAULT_CALLBACK_PATH: &str = "/spotify/callback";
	/// Default scope list.
	pub const DEFAULT_SCOPES: &str = "user-read-recently-played";
	/// Default upstream request timeout in seconds.
	pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

	/// Loads `.env` (when present) and reads the configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		dotenvy::dotenv().ok();

		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Reads the configuration through `lookup`; empty values count as unset.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
		let required = |name: &'static str| read(name).ok_or(ConfigError::MissingEnv { name });
		let client_id = required("SPOTIFY_CLIENT_ID")?;
		let client_secret = required("SPOTIFY_CLIENT_SECRET")?;
		let base_uri = Url::parse(required("BASE_URI")?.trim()).map_err(|e| {
			ConfigError::InvalidEnv { name: "BASE_URI", reason: e.to_string() }
		})?;
		let callback_path =
			read("CALLBACK_PATH").unwrap_or_else(|| Self::DEFAULT_CALLBACK_PATH.to_owned());
		let scopes = read("SPOTIFY_SCOPES")
			.unwrap_or_else(|| Self::DEFAULT_SCOPES.to_owned())
			.split([' ', ','])
			.filter(|scope| !scope.is_empty())
			.map(str::to_owned)
			.collect::<Vec<_>>();
		let http_timeout = match read("HTTP_TIMEOUT_SECS") {
			Some(raw) => parse_timeout("HTTP_TIMEOUT_SECS", &raw)?,
			None => std::time::Duration::from_secs(Self::DEFAULT_HTTP_TIMEOUT_SECS),
		};
		let store_timeout = match read("STORE_TIMEOUT_SECS") {
			Some(raw) => parse_timeout("STORE_TIMEOUT_SECS", &raw)?,
			None => http_timeout,
		};
		let config = Self {
			client_id,
			client_secret,
			base_uri,
			callback_path,
			scopes,
			http_timeout,
			store_timeout,
		};

		config.redirect_uri()?;

		Ok(config)
	}

	/// Redirect URI registered with the provider: `callback_path` appended to the path of
	/// `base_uri`, so a service mounted under a prefix keeps it.
	pub fn redirect_uri(&self) -> Result<Url, ConfigError> {
		if self.base_uri.cannot_be_a_base() {
			return Err(ConfigError::InvalidRedirect {
				source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
			});
		}

		let mut url = self.base_uri.clone();
		let path = format!(
			"{}/{}",
			url.path().trim_end_matches('/'),
			self.callback_path.trim_start_matches('/')
		);

		url.set_path(&path);
		url.set_query(None);
		url.set_fragment(None);

		Ok(url)
	}
}
impl Debug for BrokerConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BrokerConfig")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("base_uri", &self.base_uri.as_str())
			.field("callback_path", &self.callback_path)
			.field("scopes", &self.scopes)
			.field("http_timeout", &self.http_timeout)
			.field("store_timeout", &self.store_timeout)
			.finish()
	}
}

fn parse_timeout(name: &'static str, raw: &str) -> Result<std::time::Duration, ConfigError> {
	let secs = raw
		.trim()
		.parse::<u64>()
		.map_err(|e| ConfigError::InvalidEnv { name, reason: e.to_string() })?;

	if secs == 0 {
		return Err(ConfigError::InvalidEnv {
			name,
			reason: "timeout must be at least one second".into(),
		});
	}

	Ok(std::time::Duration::from_secs(secs))
}
