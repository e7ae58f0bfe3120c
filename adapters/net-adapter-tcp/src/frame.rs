//! Wire frames: one JSON object per line

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use peerlink_types::prelude::*;
use peerlink_types::types::NetworkName;

/// The only protocol spoken on a connection
pub const HELLO_PROTOCOL: &str = "/peerlink/hello/1.0.0";

/// Longest accepted line, newline included
pub const MAX_FRAME: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frame {
	Hello {
		id: PeerId,
		agent: Box<str>,
		network: NetworkName,
		/// Addresses the sender can be dialed at
		#[serde(default)]
		addrs: Vec<Box<str>>,
	},
	Heartbeat,
	Disconnect,
}

/// Write a frame and return the number of bytes sent
pub async fn write_frame<W: AsyncWrite + Unpin>(w: &mut W, frame: &Frame) -> PlResult<usize> {
	let mut buf = serde_json::to_vec(frame)?;
	buf.push(b'\n');
	w.write_all(&buf).await?;
	w.flush().await?;
	Ok(buf.len())
}

/// Read one frame with its size in bytes. `Ok(None)` at end of stream.
pub async fn read_frame<R: AsyncBufRead + Unpin>(
	r: &mut R,
	line: &mut String,
) -> PlResult<Option<(Frame, usize)>> {
	line.clear();
	let n = (&mut *r).take(MAX_FRAME as u64 + 1).read_line(line).await?;
	if n == 0 {
		return Ok(None);
	}
	if n > MAX_FRAME {
		return Err(Error::Network(format!("frame longer than {} bytes", MAX_FRAME)));
	}
	Ok(Some((serde_json::from_str(line.trim_end())?, n)))
}


// vim: ts=4
