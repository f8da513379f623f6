//! NDJSON codec for the controller connection.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a maximum line length so an
//! unterminated or oversized frame cannot exhaust memory.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Maximum inbound frame length: 4 MiB.
///
/// Large `apply-edits` payloads carry whole file sections, so the limit is
/// higher than a typical control channel needs.
pub const MAX_LINE_BYTES: usize = 4 * 1_048_576;

/// Newline-delimited JSON codec used by both transport tasks.
///
/// Inbound lines longer than [`MAX_LINE_BYTES`] return
/// [`AppError::Protocol`]`("line too long: …")`; I/O errors map to
/// [`AppError::Transport`].
#[derive(Debug)]
pub struct FrameCodec(LinesCodec);

impl FrameCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self(LinesCodec::new_with_max_length(MAX_LINE_BYTES))
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode(src).map_err(map_codec_error)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode_eof(src).map_err(map_codec_error)
    }
}

impl Encoder<String> for FrameCodec {
    type Error = AppError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        self.0.encode(item, dst).map_err(map_codec_error)
    }
}

fn map_codec_error(e: LinesCodecError) -> AppError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Protocol(format!("line too long: exceeded {MAX_LINE_BYTES} bytes"))
        }
        LinesCodecError::Io(io_err) => AppError::Transport(io_err.to_string()),
    }
}
