//! SSRF guard for central-instance URLs.
//!
//! [`UrlGuard::validate`] runs before every token exchange, not only when configuration is
//! loaded, so a changed configuration can never point the exchange at internal infrastructure.
//! Every resolved address is checked, and the returned [`GuardedUrl`] carries those addresses
//! so the transport can pin its connection to them instead of resolving the host a second time.

pub mod resolver;

pub use resolver::*;

// crates.io
use url::Host;
// self
use crate::{_prelude::*, obs};

/// Reasons a central-instance URL is refused.
#[derive(Clone, Debug, ThisError)]
pub enum UrlGuardError {
	/// The URL string is empty.
	#[error("Central instance URL must not be empty.")]
	Empty,
	/// The URL is not a syntactically valid absolute URL.
	#[error("Invalid central instance URL.")]
	Invalid {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The scheme is neither `http` nor `https`.
	#[error("Central instance URL must use http or https scheme, got `{scheme}`.")]
	UnsupportedScheme {
		/// Scheme found in the URL.
		scheme: String,
	},
	/// The URL carries no host component.
	#[error("Central instance URL must contain a host.")]
	MissingHost,
	/// DNS returned an error or no address at all.
	#[error("Cannot resolve central instance URL host `{host}`.")]
	Unresolvable {
		/// Host that failed to resolve.
		host: String,
		/// Resolver failure.
		#[source]
		source: Arc<std::io::Error>,
	},
	/// The host resolves to a loopback, link-local, private, or unspecified address.
	#[error("Central instance URL host `{host}` is not allowed (resolves to {address}).")]
	HostNotAllowed {
		/// Host named in the URL.
		host: String,
		/// First offending address.
		address: IpAddr,
	},
}

/// URL that passed validation, together with the addresses that were checked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardedUrl {
	/// Parsed URL.
	pub url: Url,
	/// Host component as written in the URL (brackets stripped for IPv6 literals).
	pub host: String,
	/// Every address the host resolved to; all of them are publicly routable.
	pub addrs: Vec<IpAddr>,
	domain: bool,
}
impl GuardedUrl {
	/// Returns `true` when the host is a DNS name rather than an IP literal.
	pub fn is_domain(&self) -> bool {
		self.domain
	}

	/// Validated addresses with a zero port, the form reqwest expects for DNS overrides.
	pub fn pinned_addrs(&self) -> Vec<SocketAddr> {
		self.addrs.iter().map(|ip| SocketAddr::new(*ip, 0)).collect()
	}
}

/// Validates central-instance URLs against SSRF targets.
#[derive(Clone)]
pub struct UrlGuard {
	resolver: Arc<dyn HostResolver>,
}
impl UrlGuard {
	/// Creates a guard that resolves names through `resolver`.
	pub fn new(resolver: Arc<dyn HostResolver>) -> Self {
		Self { resolver }
	}

	/// Checks `raw` in order: non-empty, absolute URL, http(s) scheme, host present, host
	/// resolvable, and no resolved address in a blocked range.
	pub async fn validate(&self, raw: &str) -> Result<GuardedUrl, UrlGuardError> {
		if raw.is_empty() {
			return Err(UrlGuardError::Empty);
		}

		let url = Url::parse(raw).map_err(|source| match source {
			// Special schemes without a host fail to parse, so scheme and host are checked here.
			url::ParseError::EmptyHost => match raw.split_once(':') {
				Some((scheme, _)) if !is_supported_scheme(scheme) =>
					UrlGuardError::UnsupportedScheme { scheme: scheme.to_ascii_lowercase() },
				_ => UrlGuardError::MissingHost,
			},
			source => UrlGuardError::Invalid { source },
		})?;

		if !is_supported_scheme(url.scheme()) {
			return Err(UrlGuardError::UnsupportedScheme { scheme: url.scheme().to_owned() });
		}

		let (host, addrs, domain) = match url.host() {
			None => return Err(UrlGuardError::MissingHost),
			Some(Host::Domain("")) => return Err(UrlGuardError::MissingHost),
			Some(Host::Ipv4(ip)) => (ip.to_string(), vec![IpAddr::V4(ip)], false),
			Some(Host::Ipv6(ip)) => (ip.to_string(), vec![IpAddr::V6(ip)], false),
			Some(Host::Domain(name)) => {
				let port = url.port_or_known_default().unwrap_or(80);
				let addrs = self.resolver.resolve(name, port).await.map_err(|source| {
					UrlGuardError::Unresolvable { host: name.to_owned(), source: Arc::new(source) }
				})?;

				if addrs.is_empty() {
					return Err(UrlGuardError::Unresolvable {
						host: name.to_owned(),
						source: Arc::new(std::io::Error::new(
							std::io::ErrorKind::NotFound,
							"resolver returned no addresses",
						)),
					});
				}

				(name.to_owned(), addrs, true)
			},
		};

		if let Some(address) = addrs.iter().copied().find(|ip| is_blocked(*ip)) {
			obs::warn_event!(host = %host, %address, "Rejected central instance URL.");

			return Err(UrlGuardError::HostNotAllowed { host, address });
		}

		Ok(GuardedUrl { url, host, addrs, domain })
	}
}
impl Default for UrlGuard {
	fn default() -> Self {
		Self::new(Arc::new(SystemResolver))
	}
}
impl Debug for UrlGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("UrlGuard(..)")
	}
}

fn is_supported_scheme(scheme: &str) -> bool {
	scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
}

/// Returns `true` for unspecified, loopback, link-local, and private/site-local addresses.
///
/// IPv4-mapped IPv6 addresses are judged by the IPv4 address they embed.
pub fn is_blocked(ip: IpAddr) -> bool {
	match ip {
		IpAddr::V4(v4) => is_blocked_v4(v4),
		IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
			Some(v4) => is_blocked_v4(v4),
			None => is_blocked_v6(v6),
		},
	}
}

fn is_blocked_v4(ip: Ipv4Addr) -> bool {
	ip.is_unspecified() || ip.is_loopback() || ip.is_link_local() || ip.is_private()
}

fn is_blocked_v6(ip: Ipv6Addr) -> bool {
	// fec0::/10, the deprecated site-local block.
	let site_local = ip.segments()[0] & 0xffc0 == 0xfec0;

	ip.is_unspecified()
		|| ip.is_loopback()
		|| ip.is_unicast_link_local()
		|| ip.is_unique_local()
		|| site_local
}
