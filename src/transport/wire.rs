//! Frame message framing.
//!
//! Every message is a single frame, big-endian:
//!
//! ```text
//! magic "CTF1" | u16 source_len | source utf-8 | u8 encoding
//!              | u32 width | u32 height | u32 payload_len | payload
//! ```
//!
//! The receiver answers each message with [`ACK`] before the sender may push
//! the next one.

use std::io::{ErrorKind, Read, Write};

use anyhow::{anyhow, Context, Result};

use crate::frame::Frame;

pub const MAGIC: &[u8; 4] = b"CTF1";
/// Fixed acknowledgment sent after each received frame.
pub const ACK: &[u8; 2] = b"OK";
pub const MAX_PAYLOAD_BYTES: usize = 32 * 1024 * 1024;
pub const MAX_SOURCE_ID_BYTES: usize = 255;

/// How the pixel payload is encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameEncoding {
    /// Packed RGB, `width * height * 3` bytes.
    RawRgb,
    /// A JPEG image; width/height are informational.
    Jpeg,
}

impl FrameEncoding {
    fn to_byte(self) -> u8 {
        match self {
            FrameEncoding::RawRgb => 0,
            FrameEncoding::Jpeg => 1,
        }
    }

    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(FrameEncoding::RawRgb),
            1 => Ok(FrameEncoding::Jpeg),
            other => Err(anyhow!("unknown frame encoding {}", other)),
        }
    }
}

/// One frame on the wire. The payload is not decoded until [`FrameMessage::decode_frame`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameMessage {
    pub source_id: String,
    pub encoding: FrameEncoding,
    pub width: u32,
    pub height: u32,
    pub payload: Vec<u8>,
}

impl FrameMessage {
    /// Raw RGB message for `frame`.
    pub fn raw(source_id: &str, frame: &Frame) -> Self {
        Self {
            source_id: source_id.to_string(),
            encoding: FrameEncoding::RawRgb,
            width: frame.width(),
            height: frame.height(),
            payload: frame.pixels().to_vec(),
        }
    }

    /// JPEG-compressed message for `frame`.
    pub fn jpeg(source_id: &str, frame: &Frame, quality: u8) -> Result<Self> {
        let mut payload = Vec::new();
        let encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut payload, quality.clamp(1, 100));
        frame
            .to_rgb_image()
            .write_with_encoder(encoder)
            .context("encode frame as jpeg")?;
        Ok(Self {
            source_id: source_id.to_string(),
            encoding: FrameEncoding::Jpeg,
            width: frame.width(),
            height: frame.height(),
            payload,
        })
    }

    /// Decode the payload into a frame.
    pub fn decode_frame(&self) -> Result<Frame> {
        match self.encoding {
            FrameEncoding::RawRgb => Frame::from_rgb(self.payload.clone(), self.width, self.height),
            FrameEncoding::Jpeg => Frame::decode(&self.payload),
        }
    }
}

pub fn write_message<W: Write>(out: &mut W, message: &FrameMessage) -> Result<()> {
    let source = message.source_id.as_bytes();
    if source.len() > MAX_SOURCE_ID_BYTES {
        return Err(anyhow!(
            "source id is {} bytes, limit is {}",
            source.len(),
            MAX_SOURCE_ID_BYTES
        ));
    }
    if message.payload.len() > MAX_PAYLOAD_BYTES {
        return Err(anyhow!(
            "frame payload is {} bytes, limit is {}",
            message.payload.len(),
            MAX_PAYLOAD_BYTES
        ));
    }

    let mut header = Vec::with_capacity(4 + 2 + source.len() + 1 + 12);
    header.extend_from_slice(MAGIC);
    header.extend_from_slice(&(source.len() as u16).to_be_bytes());
    header.extend_from_slice(source);
    header.push(message.encoding.to_byte());
    header.extend_from_slice(&message.width.to_be_bytes());
    header.extend_from_slice(&message.height.to_be_bytes());
    header.extend_from_slice(&(message.payload.len() as u32).to_be_bytes());

    out.write_all(&header).context("write frame header")?;
    out.write_all(&message.payload)
        .context("write frame payload")?;
    out.flush().context("flush frame")?;
    Ok(())
}

/// Read one message. Returns `Ok(None)` on a clean end of stream between messages.
pub fn read_message<R: Read>(input: &mut R) -> Result<Option<FrameMessage>> {
    // Only a stream that ends before the first byte is a clean end.
    let mut magic = [0u8; 4];
    match input.read_exact(&mut magic[..1]) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(anyhow::Error::new(err).context("read frame magic")),
    }
    input
        .read_exact(&mut magic[1..])
        .context("read frame magic")?;
    if &magic != MAGIC {
        return Err(anyhow!("bad frame magic {:02x?}", magic));
    }

    let source_len = read_u16(input).context("read source id length")? as usize;
    if source_len > MAX_SOURCE_ID_BYTES {
        return Err(anyhow!("source id length {} over limit", source_len));
    }
    let mut source = vec![0u8; source_len];
    input.read_exact(&mut source).context("read source id")?;
    let source_id = String::from_utf8(source).context("source id is not utf-8")?;

    let mut encoding = [0u8; 1];
    input.read_exact(&mut encoding).context("read encoding")?;
    let encoding = FrameEncoding::from_byte(encoding[0])?;
    let width = read_u32(input).context("read width")?;
    let height = read_u32(input).context("read height")?;
    let payload_len = read_u32(input).context("read payload length")? as usize;
    if payload_len > MAX_PAYLOAD_BYTES {
        return Err(anyhow!(
            "frame payload of {} bytes exceeds limit of {}",
            payload_len,
            MAX_PAYLOAD_BYTES
        ));
    }
    let mut payload = vec![0u8; payload_len];
    input.read_exact(&mut payload).context("read frame payload")?;

    Ok(Some(FrameMessage {
        source_id,
        encoding,
        width,
        height,
        payload,
    }))
}

fn read_u16<R: Read>(input: &mut R) -> std::io::Result<u16> {
    let mut buf = [0u8; 2];
    input.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

fn read_u32<R: Read>(input: &mut R) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn gradient_frame(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x * 16) as u8, (y * 16) as u8, 128]);
            }
        }
        Frame::from_rgb(data, width, height).unwrap()
    }

    #[test]
    fn raw_message_survives_the_wire() -> Result<()> {
        let frame = gradient_frame(4, 3);
        let mut buf = Vec::new();
        write_message(&mut buf, &FrameMessage::raw("pi-cam", &frame))?;

        let message = read_message(&mut Cursor::new(buf))?.expect("one message");
        assert_eq!(message.source_id, "pi-cam");
        assert_eq!(message.encoding, FrameEncoding::RawRgb);
        assert_eq!(message.decode_frame()?, frame);
        Ok(())
    }

    #[test]
    fn jpeg_message_decodes_to_same_dimensions() -> Result<()> {
        let frame = gradient_frame(16, 8);
        let message = FrameMessage::jpeg("pi-cam", &frame, 90)?;
        let decoded = message.decode_frame()?;
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
        Ok(())
    }

    #[test]
    fn clean_eof_yields_none() -> Result<()> {
        assert!(read_message(&mut Cursor::new(Vec::<u8>::new()))?.is_none());
        Ok(())
    }

    #[test]
    fn stream_ending_inside_magic_is_an_error() {
        let mut cursor = Cursor::new(b"CT".to_vec());
        assert!(read_message(&mut cursor).is_err());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut cursor = Cursor::new(b"XXXX\x00\x00".to_vec());
        assert!(read_message(&mut cursor).is_err());
    }

    #[test]
    fn truncated_payload_is_an_error() -> Result<()> {
        let mut buf = Vec::new();
        write_message(&mut buf, &FrameMessage::raw("cam", &gradient_frame(2, 2)))?;
        buf.truncate(buf.len() - 3);
        assert!(read_message(&mut Cursor::new(buf)).is_err());
        Ok(())
    }

    #[test]
    fn garbage_jpeg_only_fails_at_decode() -> Result<()> {
        let message = FrameMessage {
            source_id: "cam".to_string(),
            encoding: FrameEncoding::Jpeg,
            width: 2,
            height: 2,
            payload: b"not a jpeg".to_vec(),
        };
        let mut buf = Vec::new();
        write_message(&mut buf, &message)?;
        let received = read_message(&mut Cursor::new(buf))?.expect("one message");
        assert!(received.decode_frame().is_err());
        Ok(())
    }
}
