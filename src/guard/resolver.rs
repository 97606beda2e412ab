//! Host name resolution backends consulted by the URL guard.

// self
use crate::_prelude::*;

/// Boxed future returned by [`HostResolver::resolve`].
pub type ResolveFuture<'a> =
	Pin<Box<dyn Future<Output = std::io::Result<Vec<IpAddr>>> + 'a + Send>>;

/// Resolves a host name to the addresses a connection could reach.
pub trait HostResolver
where
	Self: Send + Sync,
{
	/// Looks up every address for `host`; `port` is passed through for resolvers that need it.
	fn resolve<'a>(&'a self, host: &'a str, port: u16) -> ResolveFuture<'a>;
}

/// System DNS resolver backed by tokio's `lookup_host`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;
impl HostResolver for SystemResolver {
	fn resolve<'a>(&'a self, host: &'a str, port: u16) -> ResolveFuture<'a> {
		Box::pin(async move {
			let addrs = tokio::net::lookup_host((host, port)).await?;

			Ok(addrs.map(|addr| addr.ip()).collect())
		})
	}
}

/// Fixed host table, for deployments with pinned DNS and for tests.
///
/// Lookups are case-insensitive. Unknown hosts fail with [`std::io::ErrorKind::NotFound`].
#[derive(Clone, Debug, Default)]
pub struct StaticResolver(HashMap<String, Vec<IpAddr>>);
impl StaticResolver {
	/// Adds (or replaces) the addresses for `host`.
	pub fn with_host(
		mut self,
		host: impl AsRef<str>,
		addrs: impl IntoIterator<Item = IpAddr>,
	) -> Self {
		self.0.insert(host.as_ref().to_ascii_lowercase(), addrs.into_iter().collect());

		self
	}
}
impl HostResolver for StaticResolver {
	fn resolve<'a>(&'a self, host: &'a str, _port: u16) -> ResolveFuture<'a> {
		let found = self.0.get(&host.to_ascii_lowercase()).cloned();

		Box::pin(async move {
			found.ok_or_else(|| {
				std::io::Error::new(
					std::io::ErrorKind::NotFound,
					format!("no static entry for host `{host}`"),
				)
			})
		})
	}
}
