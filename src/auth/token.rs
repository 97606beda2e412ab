//! Access-token record returned by the central instance's token endpoint.

// self
use crate::{_prelude::*, auth::TokenSecret, error::GenericError};

/// Unknown response fields kept verbatim.
pub type ExtraFields = serde_json::Map<String, serde_json::Value>;

/// Bearer credential minted by the central instance.
///
/// `expiresIn` is measured in milliseconds by contract with the central instance. Fields the
/// crate does not interpret are preserved in [`AccessToken::extra`] and serialized back unchanged.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
	/// Opaque token value; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Validity window in milliseconds, counted from the moment the response is received.
	pub expires_in: i64,
	/// Additional response fields.
	#[serde(flatten)]
	pub extra: ExtraFields,
}
impl AccessToken {
	/// Creates a token without extra fields.
	pub fn new(access_token: impl Into<TokenSecret>, expires_in: i64) -> Self {
		Self { access_token: access_token.into(), expires_in, extra: ExtraFields::new() }
	}

	/// Parses a token endpoint response body, reporting the JSON path of any failure.
	pub fn from_slice(body: &[u8]) -> Result<Self, serde_path_to_error::Error<serde_json::Error>> {
		let mut de = serde_json::Deserializer::from_slice(body);

		serde_path_to_error::deserialize(&mut de)
	}

	/// Returns the validity window as a [`Duration`].
	pub fn lifetime(&self) -> Duration {
		Duration::milliseconds(self.expires_in)
	}

	/// Computes the absolute expiry instant for a token received at `received_at`.
	///
	/// Negative lifetimes produce an instant in the past, so the token is already expired.
	pub fn expires_at(&self, received_at: OffsetDateTime) -> Result<OffsetDateTime, GenericError> {
		received_at
			.checked_add(self.lifetime())
			.ok_or(GenericError::ExpiresInOutOfRange { expires_in: self.expires_in })
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("access_token", &"<redacted>")
			.field("expires_in", &self.expires_in)
			.field("extra", &self.extra.keys().collect::<Vec<_>>())
			.finish()
	}
}
