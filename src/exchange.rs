//! Single token exchange against a central instance.
//!
//! [`TokenExchange::exchange`] validates the central-instance URL through the [`UrlGuard`],
//! posts the access key to the token endpoint, and classifies the answer: `200` parses into an
//! [`AccessToken`], `401` becomes [`Error::AuthDenied`], and everything else (redirects
//! included) is a [`GenericError`].

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, LocalInstance},
	error::GenericError,
	guard::UrlGuard,
	http::{HttpConfig, ScopedHttpClient, TokenEndpointResponse},
	obs::{self, OpOutcome, OpSpan, TokenOp},
};

/// Performs guarded token exchanges.
#[derive(Clone, Debug, Default)]
pub struct TokenExchange {
	guard: UrlGuard,
	http: HttpConfig,
}
impl TokenExchange {
	/// Creates an exchange using the provided guard and HTTP settings.
	pub fn new(guard: UrlGuard, http: HttpConfig) -> Self {
		Self { guard, http }
	}

	/// Trades the instance's access key for a fresh access token.
	pub async fn exchange(&self, instance: &LocalInstance) -> Result<AccessToken> {
		const OP: TokenOp = TokenOp::Exchange;

		let span = OpSpan::new(OP, "exchange");

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				let target = self.guard.validate(&instance.central_instance_url).await?;
				let endpoint = self.http.endpoint(&target);
				let client = ScopedHttpClient::connect(&self.http, &target)?;

				obs::debug_event!(endpoint = %endpoint, "Requesting access token.");

				let response = client
					.post_access_key(&endpoint, &instance.access_key)
					.await
					.map_err(|e| GenericError::transport(endpoint.as_str(), e))?;

				classify_response(endpoint.as_str(), response)
			})
			.await;

		match &result {
			Ok(_) => obs::record_op_outcome(OP, OpOutcome::Success),
			Err(_e) => {
				obs::warn_event!(error = %_e, "Token exchange failed.");
				obs::record_op_outcome(OP, OpOutcome::Failure);
			},
		}

		result
	}
}

/// Maps a token endpoint answer onto the crate's outcome taxonomy.
pub fn classify_response(endpoint: &str, response: TokenEndpointResponse) -> Result<AccessToken> {
	match response.status {
		200 => AccessToken::from_slice(&response.body).map_err(|source| {
			GenericError::MalformedResponse { url: endpoint.to_owned(), source: Arc::new(source) }
				.into()
		}),
		401 => Err(Error::AuthDenied { url: endpoint.to_owned() }),
		status => Err(GenericError::UnexpectedStatus { url: endpoint.to_owned(), status }.into()),
	}
}
