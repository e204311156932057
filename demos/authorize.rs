//! Runs the authorization round trip against Spotify from the command line.
//!
//! Without arguments it prints the authorize URL. After approving, pass the `code` query
//! parameter from the callback URL as the first argument to exchange it, persist the refresh
//! token in `identities.json`, and resolve an access token for the authorized user.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
// self
use lastplayed_broker::{
	config::BrokerConfig,
	lifecycle::CredentialManager,
	provider::ProviderDescriptor,
	store::{FileStore, IdentityStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = BrokerConfig::from_env()?;
	let store: Arc<dyn IdentityStore> = Arc::new(FileStore::open("identities.json")?);
	let manager = CredentialManager::from_config(&config, &ProviderDescriptor::spotify()?, store)?;
	let Some(code) = std::env::args().nth(1) else {
		let session = manager.start_authorization();

		println!("Send your browser to {}.", session.authorize_url);
		println!("Expect `state={}` on the callback, then rerun with the `code` value.", session.state);

		return Ok(());
	};
	let user = manager.complete_authorization(&code).await?;
	let access = manager.resolve_access_token(&user).await?;

	println!(
		"Authorized `{user}`; access token valid for {} more seconds.",
		access.remaining_at(time::OffsetDateTime::now_utc()).whole_seconds()
	);

	Ok(())
}
