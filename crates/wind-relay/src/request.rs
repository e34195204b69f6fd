//! Initial-frame parser (component C2): `password(56 opaque bytes) | CRLF |
//! command(1) | address | CRLF | payload`.

use bytes::{Buf, BytesMut};
use num_enum::{FromPrimitive, IntoPrimitive};
use tokio_util::codec::Decoder;

use crate::addr::{Address, AddressCodec};

pub const PASSWORD_HEX_LEN: usize = 56;
const CRLF: &[u8] = b"\r\n";

#[derive(IntoPrimitive, FromPrimitive, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
	Connect      = 1,
	UdpAssociate = 3,
	#[num_enum(catch_all)]
	Other(u8),
}

/// A fully parsed initial frame. `payload` is whatever trailed the second
/// CRLF in the same read; it still needs to be forwarded.
#[derive(Debug, Clone)]
pub struct Request {
	pub password: String,
	pub command:  Command,
	pub address:  Address,
	pub payload:  bytes::Bytes,
}

/// Attempts to parse a request out of `data`. Unlike the wire codecs in
/// [`crate::addr`] and [`crate::udp_frame`], a parse failure here is never a
/// protocol error to propagate upward — callers treat it as "not our
/// protocol" and fall back to the disguise origin (see session §4.6).
pub fn parse(data: &[u8]) -> Option<Request> {
	if data.len() < PASSWORD_HEX_LEN + 2 {
		return None;
	}
	let password_raw = &data[..PASSWORD_HEX_LEN];
	if &data[PASSWORD_HEX_LEN..PASSWORD_HEX_LEN + 2] != CRLF {
		return None;
	}
	let password = String::from_utf8_lossy(password_raw).into_owned();

	let mut rest = BytesMut::from(&data[PASSWORD_HEX_LEN + 2..]);
	if rest.is_empty() {
		return None;
	}
	let command = Command::from(rest[0]);
	if matches!(command, Command::Other(_)) {
		return None;
	}
	rest.advance(1);

	let mut codec = AddressCodec;
	let address = codec.decode(&mut rest).ok().flatten()?;

	if rest.len() < 2 || &rest[..2] != CRLF {
		return None;
	}
	rest.advance(2);

	Some(Request {
		password,
		command,
		address,
		payload: rest.freeze(),
	})
}

#[cfg(test)]
mod test {
	use std::net::Ipv4Addr;

	use bytes::{BufMut, BytesMut};

	use super::*;

	fn build_frame(password: &str, command: u8, addr: Address, payload: &[u8]) -> BytesMut {
		let mut buf = BytesMut::new();
		buf.put_slice(password.as_bytes());
		buf.put_slice(CRLF);
		buf.put_u8(command);
		let mut codec = crate::addr::AddressCodec;
		tokio_util::codec::Encoder::encode(&mut codec, addr, &mut buf).unwrap();
		buf.put_slice(CRLF);
		buf.put_slice(payload);
		buf
	}

	#[test]
	fn parses_connect_request() {
		let password = "a".repeat(PASSWORD_HEX_LEN);
		let frame = build_frame(&password, 1, Address::IPv4(Ipv4Addr::new(93, 184, 216, 34), 80), b"GET / HTTP/1.0\r\n\r\n");
		let req = parse(&frame).expect("should parse");
		assert_eq!(req.password, password);
		assert_eq!(req.command, Command::Connect);
		assert_eq!(req.address, Address::IPv4(Ipv4Addr::new(93, 184, 216, 34), 80));
		assert_eq!(&req.payload[..], b"GET / HTTP/1.0\r\n\r\n");
	}

	#[test]
	fn parses_udp_associate() {
		let password = "b".repeat(PASSWORD_HEX_LEN);
		let frame = build_frame(&password, 3, Address::Domain("example.com".into(), 443), b"");
		let req = parse(&frame).expect("should parse");
		assert_eq!(req.command, Command::UdpAssociate);
	}

	#[test]
	fn rejects_missing_terminator() {
		let password = "c".repeat(PASSWORD_HEX_LEN);
		let mut frame = build_frame(&password, 1, Address::IPv4(Ipv4Addr::LOCALHOST, 80), b"x");
		// Corrupt the second CRLF.
		let crlf_pos = PASSWORD_HEX_LEN + 2 + 1 + 1 + 4 + 2;
		frame[crlf_pos] = b'X';
		assert!(parse(&frame).is_none());
	}

	#[test]
	fn rejects_plain_http_as_not_a_request() {
		assert!(parse(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n").is_none());
	}

	#[test]
	fn rejects_short_buffer() {
		assert!(parse(b"short").is_none());
	}

	#[test]
	fn accepts_non_hex_password() {
		// §4.2: the password field is opaque bytes, not necessarily hex —
		// this is the spec's own canonical scenario 1 password.
		let password = "P".repeat(PASSWORD_HEX_LEN);
		let frame = build_frame(&password, 1, Address::IPv4(Ipv4Addr::new(93, 184, 216, 34), 80), b"GET / HTTP/1.0\r\n\r\n");
		let req = parse(&frame).expect("should parse a non-hex but well-formed password");
		assert_eq!(req.password, password);
	}
}
