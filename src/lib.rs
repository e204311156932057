//! OAuth 2.0 credential lifecycle manager for last-played music badges: cached access tokens,
//! durable refresh credentials, and single-flight refreshes per user.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		http::ReqwestHttpClient,
		lifecycle::{AuthorizationSettings, CredentialManager},
		oauth::{ReqwestExchangeClient, ReqwestTransportErrorMapper, TokenExchangeClient},
		provider::{DefaultProviderStrategy, ProviderDescriptor, ProviderStrategy},
		store::{IdentityStore, MemoryStore},
	};

	/// Redirect URI shared by integration tests.
	pub const TEST_REDIRECT_URI: &str = "https://badges.example.com/spotify/callback";

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.timeout(std::time::Duration::from_secs(5))
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Constructs a [`CredentialManager`] backed by an in-memory store, the default provider
	/// strategy, and the reqwest transport used across integration tests.
	pub fn build_reqwest_test_manager(
		descriptor: ProviderDescriptor,
		client_id: &str,
		client_secret: &str,
	) -> (CredentialManager, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn IdentityStore> = store_backend.clone();
		let strategy: Arc<dyn ProviderStrategy> = Arc::new(DefaultProviderStrategy);
		let exchange = ReqwestExchangeClient::from_descriptor(
			&descriptor,
			client_id,
			Some(client_secret),
			strategy,
			test_reqwest_http_client(),
			ReqwestTransportErrorMapper,
		)
		.expect("Exchange client should build from the test descriptor.");
		let exchange: Arc<dyn TokenExchangeClient> = Arc::new(exchange);
		let redirect_uri =
			Url::parse(TEST_REDIRECT_URI).expect("Test redirect URI should parse successfully.");
		let settings = AuthorizationSettings::from_descriptor(
			&descriptor,
			client_id,
			redirect_uri,
			["user-read-recently-played"],
		);

		(CredentialManager::new(exchange, store, settings), store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tempfile as _, tokio as _};
