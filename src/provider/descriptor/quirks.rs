// self
use crate::_prelude::*;

/// Provider-specific behavior toggles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderQuirks {
	/// Character used to join scopes in the authorize URL.
	pub scope_delimiter: char,
	/// Whether the authorize URL should force the consent dialog on every authorization.
	pub show_dialog: bool,
}
impl Default for ProviderQuirks {
	fn default() -> Self {
		Self { scope_delimiter: ' ', show_dialog: false }
	}
}
