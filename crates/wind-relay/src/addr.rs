use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{Buf, BufMut};
use num_enum::{FromPrimitive, IntoPrimitive};
use snafu::{ResultExt, ensure};
use tokio_util::codec::{Decoder, Encoder};
use wind_core::types::TargetAddr;

use crate::error::{DomainTooLongSnafu, FailParseDomainSnafu, ProtoError, UnknownAddressTypeSnafu};

/// Codec for the relay's address framing: 1-byte type tag, host bytes, 2-byte
/// big-endian port. Shared by the initial request (§4.2) and every UDP frame
/// (§4.3).
#[derive(Debug, Clone, Copy)]
pub struct AddressCodec;

#[derive(Debug, Clone, PartialEq)]
pub enum Address {
	Domain(String, u16),
	IPv4(Ipv4Addr, u16),
	IPv6(Ipv6Addr, u16),
}

impl Address {
	pub fn to_target(&self) -> TargetAddr {
		match self {
			Address::Domain(d, p) => TargetAddr::Domain(d.clone(), *p),
			Address::IPv4(ip, p) => TargetAddr::IPv4(*ip, *p),
			Address::IPv6(ip, p) => TargetAddr::IPv6(*ip, *p),
		}
	}
}

impl From<TargetAddr> for Address {
	fn from(value: TargetAddr) -> Self {
		match value {
			TargetAddr::Domain(s, port) => Self::Domain(s, port),
			TargetAddr::IPv4(addr, port) => Self::IPv4(addr, port),
			TargetAddr::IPv6(addr, port) => Self::IPv6(addr, port),
		}
	}
}

/// Address type tag, SOCKS5-compatible.
#[derive(IntoPrimitive, FromPrimitive, Copy, Clone, Debug, PartialEq)]
#[repr(u8)]
pub enum AddressType {
	IPv4   = 1,
	Domain = 3,
	IPv6   = 4,
	#[num_enum(catch_all)]
	Other(u8),
}

impl Decoder for AddressCodec {
	type Error = ProtoError;
	type Item = Address;

	fn decode(&mut self, src: &mut bytes::BytesMut) -> Result<Option<Self::Item>, Self::Error> {
		if src.is_empty() {
			return Ok(None);
		}

		let addr_type = AddressType::from(src[0]);
		ensure!(!matches!(addr_type, AddressType::Other(_)), UnknownAddressTypeSnafu { value: u8::from(addr_type) });

		match addr_type {
			AddressType::IPv4 => {
				if src.len() < 1 + 4 + 2 {
					return Ok(None);
				}
				src.advance(1);
				let mut octets = [0; 4];
				src.copy_to_slice(&mut octets);
				let ip = Ipv4Addr::from(octets);
				let port = src.get_u16();
				Ok(Some(Address::IPv4(ip, port)))
			}
			AddressType::IPv6 => {
				if src.len() < 1 + 16 + 2 {
					return Ok(None);
				}
				src.advance(1);
				let mut octets = [0; 16];
				src.copy_to_slice(&mut octets);
				let ip = Ipv6Addr::from(octets);
				let port = src.get_u16();
				Ok(Some(Address::IPv6(ip, port)))
			}
			AddressType::Domain => {
				if src.len() < 1 + 1 {
					return Ok(None);
				}
				let domain_len = src[1] as usize;
				if src.len() < 1 + 1 + domain_len + 2 {
					return Ok(None);
				}
				src.advance(2);
				let domain = &src[..domain_len];
				let domain = std::str::from_utf8(domain)
					.context(FailParseDomainSnafu { raw: hex::encode(domain) })?
					.to_string();
				src.advance(domain_len);
				let port = src.get_u16();
				Ok(Some(Address::Domain(domain, port)))
			}
			AddressType::Other(_) => unreachable!(),
		}
	}
}

impl Encoder<Address> for AddressCodec {
	type Error = ProtoError;

	fn encode(&mut self, item: Address, dst: &mut bytes::BytesMut) -> Result<(), Self::Error> {
		match item {
			Address::IPv4(ip, port) => {
				dst.reserve(1 + 4 + 2);
				dst.put_u8(AddressType::IPv4.into());
				dst.put_slice(&ip.octets());
				dst.put_u16(port);
			}
			Address::IPv6(ip, port) => {
				dst.reserve(1 + 16 + 2);
				dst.put_u8(AddressType::IPv6.into());
				dst.put_slice(&ip.octets());
				dst.put_u16(port);
			}
			Address::Domain(domain, port) => {
				if domain.len() > u8::MAX as usize {
					return DomainTooLongSnafu { domain }.fail();
				}
				dst.reserve(1 + 1 + domain.len() + 2);
				dst.put_u8(AddressType::Domain.into());
				dst.put_u8(domain.len() as u8);
				dst.put_slice(domain.as_bytes());
				dst.put_u16(port);
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use std::net::{Ipv4Addr, Ipv6Addr};

	use futures_util::SinkExt as _;
	use tokio_stream::StreamExt as _;
	use tokio_util::codec::{Decoder, Encoder, FramedRead, FramedWrite};

	use super::{Address, AddressCodec};

	#[test_log::test(tokio::test)]
	async fn round_trip_all_types() -> eyre::Result<()> {
		let vars = vec![
			Address::IPv4(Ipv4Addr::LOCALHOST, 80),
			Address::IPv6(Ipv6Addr::UNSPECIFIED, 12),
			Address::Domain(String::from("example.com"), 443),
		];

		let mut writer = FramedWrite::new(Vec::with_capacity(128), AddressCodec);
		for var in &vars {
			writer.send(var.clone()).await?;
		}

		let buffer = writer.get_ref();
		let mut reader = FramedRead::new(buffer.as_slice(), AddressCodec);
		for var in vars {
			let frame = reader.next().await.unwrap()?;
			assert_eq!(var, frame);
		}
		Ok(())
	}

	#[test_log::test(tokio::test)]
	async fn partial_buffer_yields_none() -> eyre::Result<()> {
		let addr = Address::Domain(String::from("www.example.org"), 443);
		let mut writer = FramedWrite::new(Vec::with_capacity(128), AddressCodec);
		writer.send(addr.clone()).await?;
		let full = writer.into_inner();

		let mut half = full.clone();
		half.truncate(full.len() - 1);
		let mut codec = AddressCodec;
		let mut buf = bytes::BytesMut::from(&half[..]);
		assert!(codec.decode(&mut buf)?.is_none());

		let mut buf = bytes::BytesMut::from(&full[..]);
		assert_eq!(codec.decode(&mut buf)?.unwrap(), addr);
		Ok(())
	}

	#[test_log::test(tokio::test)]
	async fn domain_too_long_rejected() {
		let long = "a".repeat(300);
		let mut codec = AddressCodec;
		let mut buf = bytes::BytesMut::new();
		let err = codec.encode(Address::Domain(long, 1), &mut buf).unwrap_err();
		assert!(matches!(err, crate::ProtoError::DomainTooLong { .. }));
	}
}
