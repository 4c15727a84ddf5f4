use std::io::{Read, Write};
use std::net::TcpStream;

use anyhow::{anyhow, Context, Result};

use super::endpoint::Endpoint;
use super::wire::{write_message, FrameEncoding, FrameMessage, ACK};
use crate::frame::Frame;

const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Sending end of the frame transport (runs on the edge device).
pub struct FrameSender {
    stream: TcpStream,
    endpoint: Endpoint,
    encoding: FrameEncoding,
    jpeg_quality: u8,
    frames_sent: u64,
}

impl FrameSender {
    pub fn connect(endpoint: &Endpoint) -> Result<Self> {
        let stream = TcpStream::connect(endpoint.socket_addr())
            .with_context(|| format!("connect to frame hub at {}", endpoint))?;
        stream.set_nodelay(true).ok();
        log::info!("FrameSender: connected to {}", endpoint);
        Ok(Self {
            stream,
            endpoint: endpoint.clone(),
            encoding: FrameEncoding::RawRgb,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            frames_sent: 0,
        })
    }

    /// Compress frames as JPEG before sending.
    pub fn with_jpeg(mut self, quality: u8) -> Self {
        self.encoding = FrameEncoding::Jpeg;
        self.jpeg_quality = quality;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Send one frame and block until the hub acknowledges it.
    pub fn send_frame(&mut self, source_id: &str, frame: &Frame) -> Result<()> {
        let message = match self.encoding {
            FrameEncoding::RawRgb => FrameMessage::raw(source_id, frame),
            FrameEncoding::Jpeg => FrameMessage::jpeg(source_id, frame, self.jpeg_quality)?,
        };
        self.send(&message)
    }

    /// Send a prepared message and wait for the acknowledgment.
    pub fn send(&mut self, message: &FrameMessage) -> Result<()> {
        write_message(&mut self.stream, message)?;

        let mut reply = [0u8; 2];
        self.stream
            .read_exact(&mut reply)
            .context("read frame ack")?;
        if &reply != ACK {
            return Err(anyhow!("unexpected hub reply {:02x?}", reply));
        }
        self.frames_sent += 1;
        Ok(())
    }

    /// Close the connection so the hub sees end-of-stream.
    pub fn close(mut self) -> Result<()> {
        self.stream.flush().ok();
        self.stream
            .shutdown(std::net::Shutdown::Both)
            .context("close frame sender")
    }
}
