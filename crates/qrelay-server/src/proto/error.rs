use std::backtrace::Backtrace;

use snafu::Snafu;

/// Everything that can go wrong decoding or encoding a wire message.
///
/// Every variant here is a [`crate::Error::Protocol`] at the connection
/// handler level: malformed input always tears the connection down, it is
/// never retried.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProtoError {
	#[snafu(display("i/o error on the wire"))]
	Io {
		source:    std::io::Error,
		backtrace: Backtrace,
	},

	#[snafu(display("{field} is not valid UTF-8"))]
	InvalidUtf8 {
		field:     &'static str,
		source:    std::string::FromUtf8Error,
		backtrace: Backtrace,
	},

	#[snafu(display("data frame length {len} exceeds the maximum Opus packet size ({max})"))]
	FrameTooLarge { len: u16, max: u16, backtrace: Backtrace },

	#[snafu(display("username exceeds 255 UTF-8 bytes"))]
	UsernameTooLong { backtrace: Backtrace },

	#[snafu(display("password exceeds 255 UTF-8 bytes"))]
	PasswordTooLong { backtrace: Backtrace },
}

impl From<std::io::Error> for ProtoError {
	fn from(source: std::io::Error) -> Self {
		use snafu::IntoError as _;
		IoSnafu.into_error(source)
	}
}
