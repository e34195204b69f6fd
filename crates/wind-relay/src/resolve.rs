//! Async name resolution wrapper (external port referenced by §6/§5).

use std::net::SocketAddr;

use tokio::net::lookup_host;

/// Resolves `host:port` to an ordered list of candidate endpoints. Domains
/// are resolved via the system resolver on a blocking-safe async path;
/// literal IPs resolve trivially to a single-element list.
pub async fn resolve_endpoints(host: &str, port: u16) -> std::io::Result<Vec<SocketAddr>> {
	lookup_host((host, port)).await.map(|iter| iter.collect())
}

/// Picks the first endpoint, preferring IPv4 when `prefer_ipv4` is set and
/// both families are present (§4.6 `udp_sent`, §6 `tcp.prefer_ipv4`).
pub fn pick_endpoint(endpoints: &[SocketAddr], prefer_ipv4: bool) -> Option<SocketAddr> {
	if prefer_ipv4 {
		if let Some(addr) = endpoints.iter().find(|a| a.is_ipv4()) {
			return Some(*addr);
		}
	}
	endpoints.first().copied()
}

#[cfg(test)]
mod test {
	use std::net::{Ipv4Addr, Ipv6Addr};

	use super::*;

	#[test]
	fn prefers_ipv4_when_requested() {
		let endpoints = vec![
			SocketAddr::new(Ipv6Addr::LOCALHOST.into(), 80),
			SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 80),
		];
		assert_eq!(pick_endpoint(&endpoints, true), Some(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 80)));
		assert_eq!(pick_endpoint(&endpoints, false), Some(endpoints[0]));
	}

	#[test]
	fn falls_back_to_first_when_no_ipv4_present() {
		let endpoints = vec![SocketAddr::new(Ipv6Addr::LOCALHOST.into(), 80)];
		assert_eq!(pick_endpoint(&endpoints, true), Some(endpoints[0]));
	}

	#[test_log::test(tokio::test)]
	async fn resolves_literal_ip_without_dns() -> eyre::Result<()> {
		let endpoints = resolve_endpoints("127.0.0.1", 443).await?;
		assert_eq!(endpoints, vec![SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 443)]);
		Ok(())
	}
}
