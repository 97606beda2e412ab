//! Caller-side configuration record pointing at a central instance.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Local configuration holding the central-instance URL and the long-lived access key.
///
/// The record is owned by the caller; the cache only reads it when a refresh is due, so
/// configuration changes take effect on the next exchange.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalInstance {
	/// Base URL of the central instance (e.g. `https://central.example.com/`).
	#[serde(rename = "centralInstanceURL")]
	pub central_instance_url: String,
	/// Long-lived shared secret presented to the token endpoint.
	pub access_key: TokenSecret,
}
impl LocalInstance {
	/// Creates a record for the provided URL and access key.
	pub fn new(central_instance_url: impl Into<String>, access_key: impl Into<TokenSecret>) -> Self {
		Self { central_instance_url: central_instance_url.into(), access_key: access_key.into() }
	}
}
impl Debug for LocalInstance {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LocalInstance")
			.field("central_instance_url", &self.central_instance_url)
			.field("access_key", &"<redacted>")
			.finish()
	}
}
