//! UDP frame codec (component C3): `address | length(2, BE) | CRLF |
//! payload(length)`, used to multiplex UDP datagrams over the TLS stream.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::addr::{Address, AddressCodec};
use crate::error::ProtoError;

const CRLF: &[u8] = b"\r\n";

#[derive(Debug, Clone, PartialEq)]
pub struct UdpFrame {
	pub address: Address,
	pub payload: bytes::Bytes,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UdpFrameCodec;

impl Decoder for UdpFrameCodec {
	type Error = ProtoError;
	type Item = UdpFrame;

	fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
		let mut cursor = src.clone();
		let mut addr_codec = AddressCodec;
		let Some(address) = addr_codec.decode(&mut cursor)? else {
			return Ok(None);
		};
		if cursor.len() < 2 + 2 {
			return Ok(None);
		}
		let len = cursor.get_u16() as usize;
		if &cursor[..2] != CRLF {
			return Ok(None);
		}
		cursor.advance(2);
		if cursor.len() < len {
			return Ok(None);
		}
		let payload = cursor.split_to(len).freeze();

		let consumed = src.len() - cursor.len();
		src.advance(consumed);
		Ok(Some(UdpFrame { address, payload }))
	}
}

impl Encoder<UdpFrame> for UdpFrameCodec {
	type Error = ProtoError;

	fn encode(&mut self, item: UdpFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
		let mut addr_codec = AddressCodec;
		addr_codec.encode(item.address, dst)?;
		dst.reserve(2 + 2 + item.payload.len());
		dst.put_u16(item.payload.len() as u16);
		dst.put_slice(CRLF);
		dst.put_slice(&item.payload);
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use std::net::Ipv4Addr;

	use futures_util::SinkExt as _;
	use tokio_stream::StreamExt as _;
	use tokio_util::codec::{FramedRead, FramedWrite};

	use super::*;

	#[test_log::test(tokio::test)]
	async fn round_trip() -> eyre::Result<()> {
		let frame = UdpFrame {
			address: Address::IPv4(Ipv4Addr::new(8, 8, 8, 8), 53),
			payload: bytes::Bytes::from_static(b"\xab\xcd\x01\x00\x00\x01"),
		};

		let mut writer = FramedWrite::new(Vec::new(), UdpFrameCodec);
		writer.send(frame.clone()).await?;
		let buffer = writer.get_ref();

		let mut reader = FramedRead::new(buffer.as_slice(), UdpFrameCodec);
		let decoded = reader.next().await.unwrap()?;
		assert_eq!(decoded, frame);
		Ok(())
	}

	#[test]
	fn incomplete_frame_yields_none() {
		let frame = UdpFrame {
			address: Address::Domain("example.com".into(), 443),
			payload: bytes::Bytes::from_static(b"hello world"),
		};
		let mut buf = BytesMut::new();
		let mut codec = UdpFrameCodec;
		codec.encode(frame, &mut buf).unwrap();
		buf.truncate(buf.len() - 3);

		let mut codec = UdpFrameCodec;
		assert!(codec.decode(&mut buf).unwrap().is_none());
		// buffer must not have been consumed
		assert!(!buf.is_empty());
	}
}
