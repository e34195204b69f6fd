use std::{backtrace::Backtrace, str::Utf8Error};

use snafu::prelude::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProtoError {
	#[snafu(display("unable to decode address due to type {value}"))]
	UnknownAddressType {
		value:     u8,
		backtrace: Backtrace,
	},
	FailParseDomain {
		raw:       String,
		source:    Utf8Error,
		backtrace: Backtrace,
	},
	DomainTooLong {
		domain:    String,
		backtrace: Backtrace,
	},
	#[snafu(display("request is missing the trailing CRLF"))]
	MissingTerminator {
		backtrace: Backtrace,
	},
	#[snafu(display("password field is not {expect} hex bytes"))]
	MalformedPassword {
		expect:    usize,
		backtrace: Backtrace,
	},
	#[snafu(display("unknown command byte {value}"))]
	UnknownCommand {
		value:     u8,
		backtrace: Backtrace,
	},
	// Caller should buffer more bytes and retry.
	BytesRemaining,
	Io {
		source:    std::io::Error,
		backtrace: Backtrace,
	},
}

impl From<std::io::Error> for ProtoError {
	#[inline(always)]
	fn from(_source: std::io::Error) -> Self {
		#[cfg(debug_assertions)]
		panic!("IO error should not be created by From<io::Error>");
		#[cfg(not(debug_assertions))]
		{
			use snafu::IntoError as _;
			IoSnafu.into_error(_source)
		}
	}
}
