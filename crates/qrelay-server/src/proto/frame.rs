//! Data frame wire format.
//!
//! Client -> server: `u16` length (LE) then that many payload bytes.
//! Server -> client: `u32` sender id (LE), `u16` length (LE), payload bytes.
//!
//! 1275 is the maximum Opus packet size (RFC 6716); the relay never looks
//! inside the payload, it only bounds its length.
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{FrameTooLargeSnafu, ProtoError};

pub const MAX_FRAME_LEN: u16 = 1275;

/// `u32` sender id + `u16` length.
pub const OUTBOUND_HEADER_LEN: usize = 6;

/// Reads one client -> server data frame. A zero length is a keep-alive:
/// it is returned as an empty payload and produces no fan-out.
pub async fn read_data_frame<R>(stream: &mut R) -> Result<Bytes, ProtoError>
where
	R: AsyncRead + Unpin,
{
	let len = stream.read_u16_le().await?;
	if len == 0 {
		return Ok(Bytes::new());
	}

	snafu::ensure!(
		len <= MAX_FRAME_LEN,
		FrameTooLargeSnafu { len, max: MAX_FRAME_LEN }
	);

	let mut buf = vec![0u8; len as usize];
	stream.read_exact(&mut buf).await?;
	Ok(Bytes::from(buf))
}

/// Encodes a server -> client frame: sender id, length, payload.
pub fn encode_outbound_frame(sender_id: u32, payload: &[u8]) -> BytesMut {
	let mut buf = BytesMut::with_capacity(OUTBOUND_HEADER_LEN + payload.len());
	buf.extend_from_slice(&sender_id.to_le_bytes());
	buf.extend_from_slice(&(payload.len() as u16).to_le_bytes());
	buf.extend_from_slice(payload);
	buf
}

pub async fn write_outbound_frame<W>(stream: &mut W, sender_id: u32, payload: &[u8]) -> Result<(), ProtoError>
where
	W: AsyncWrite + Unpin,
{
	let buf = encode_outbound_frame(sender_id, payload);
	stream.write_all(&buf).await?;
	Ok(())
}
