//! Control message wire format.
//!
//! Every control message starts with a 1-byte type tag. Unlike [`super::frame`],
//! control messages are variable-shaped depending on fields read earlier in
//! the same message (e.g. a string's length byte gates how many further
//! bytes to read), so they are decoded as a sequence of direct reads against
//! the stream rather than through a buffering `Decoder`.
use bytes::{BufMut, BytesMut};
use snafu::IntoError as _;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{InvalidUtf8Snafu, PasswordTooLongSnafu, ProtoError, UsernameTooLongSnafu};

const MAX_STRING_LEN: usize = u8::MAX as usize;

const TYPE_AUTHENTICATION: u8 = 1;
const TYPE_JOIN_CHANNEL: u8 = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
	Authentication { echo: bool, username: String, password: String },
	JoinChannel { channel_id: u32 },
	/// Any type tag the server doesn't recognize. Parsed, never rejected:
	/// the control consumer logs and ignores it.
	Invalid { kind: u8 },
}

pub async fn read_control_message<R>(stream: &mut R) -> Result<ControlMessage, ProtoError>
where
	R: AsyncRead + Unpin,
{
	let kind = stream.read_u8().await?;
	match kind {
		TYPE_AUTHENTICATION => {
			let echo = stream.read_u8().await? != 0;
			let username = read_short_string(stream, "username").await?;
			let password = read_short_string(stream, "password").await?;
			Ok(ControlMessage::Authentication { echo, username, password })
		}
		TYPE_JOIN_CHANNEL => {
			let channel_id = stream.read_u32_le().await?;
			Ok(ControlMessage::JoinChannel { channel_id })
		}
		kind => Ok(ControlMessage::Invalid { kind }),
	}
}

async fn read_short_string<R>(stream: &mut R, field: &'static str) -> Result<String, ProtoError>
where
	R: AsyncRead + Unpin,
{
	let len = stream.read_u8().await? as usize;
	let mut buf = vec![0u8; len];
	stream.read_exact(&mut buf).await?;
	String::from_utf8(buf).map_err(|source| InvalidUtf8Snafu { field }.into_error(source))
}

/// Encodes an `Authentication` message onto `buf`. Exposed for test clients
/// and any future client-side peer; the server itself only ever decodes.
pub fn encode_authentication(echo: bool, username: &str, password: &str, buf: &mut BytesMut) -> Result<(), ProtoError> {
	use snafu::ensure;

	ensure!(username.len() <= MAX_STRING_LEN, UsernameTooLongSnafu);
	ensure!(password.len() <= MAX_STRING_LEN, PasswordTooLongSnafu);

	buf.reserve(1 + 1 + 1 + username.len() + 1 + password.len());
	buf.put_u8(TYPE_AUTHENTICATION);
	buf.put_u8(echo as u8);
	buf.put_u8(username.len() as u8);
	buf.put_slice(username.as_bytes());
	buf.put_u8(password.len() as u8);
	buf.put_slice(password.as_bytes());
	Ok(())
}

pub fn encode_join_channel(channel_id: u32, buf: &mut BytesMut) {
	buf.reserve(5);
	buf.put_u8(TYPE_JOIN_CHANNEL);
	buf.put_u32_le(channel_id);
}

pub async fn write_control_message<W>(stream: &mut W, buf: BytesMut) -> Result<(), ProtoError>
where
	W: AsyncWrite + Unpin,
{
	stream.write_all(&buf).await?;
	Ok(())
}
