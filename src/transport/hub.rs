use std::io::{BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use anyhow::{Context, Result};

use super::endpoint::Endpoint;
use super::wire::{read_message, FrameMessage, ACK};

/// Receiving end of the frame transport (runs on the central node).
///
/// Serves one sender at a time. Every received frame is acknowledged before
/// it is handed to the caller.
pub struct FrameHub {
    listener: TcpListener,
    peer: Option<Peer>,
    accept_next_peer: bool,
    frames_received: u64,
}

struct Peer {
    addr: SocketAddr,
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl FrameHub {
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        let listener = TcpListener::bind(endpoint.socket_addr())
            .with_context(|| format!("bind frame hub on {}", endpoint))?;
        Ok(Self {
            listener,
            peer: None,
            accept_next_peer: true,
            frames_received: 0,
        })
    }

    /// Stop after the first sender disconnects instead of waiting for another.
    pub fn single_peer(mut self) -> Self {
        self.accept_next_peer = false;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().context("read hub local address")
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    /// Block until the next frame arrives.
    ///
    /// Returns `Ok(None)` once the sender has gone and no further sender will
    /// be accepted. A sender that breaks framing or drops mid-message is
    /// logged and disconnected; the hub then waits for the next sender.
    /// Only listener failures are returned as errors.
    pub fn recv(&mut self) -> Result<Option<FrameMessage>> {
        loop {
            if self.peer.is_none() {
                self.peer = Some(self.accept()?);
            }
            let Some(peer) = self.peer.as_mut() else {
                continue;
            };

            let message = match read_message(&mut peer.reader) {
                Ok(Some(message)) => message,
                Ok(None) => {
                    log::info!("FrameHub: sender {} disconnected", peer.addr);
                    if self.drop_peer() {
                        return Ok(None);
                    }
                    continue;
                }
                Err(err) => {
                    log::warn!("FrameHub: dropping {}: {:#}", peer.addr, err);
                    if self.drop_peer() {
                        return Ok(None);
                    }
                    continue;
                }
            };

            if let Err(err) = send_ack(&mut peer.writer) {
                log::warn!("FrameHub: dropping {}: {:#}", peer.addr, err);
                if self.drop_peer() {
                    return Ok(None);
                }
                continue;
            }
            self.frames_received += 1;
            return Ok(Some(message));
        }
    }

    /// Forget the current sender. Returns true when the hub is done.
    fn drop_peer(&mut self) -> bool {
        self.peer = None;
        !self.accept_next_peer
    }

    fn accept(&self) -> Result<Peer> {
        let (stream, addr) = self.listener.accept().context("accept frame sender")?;
        stream.set_nodelay(true).ok();
        let writer = stream.try_clone().context("clone sender stream")?;
        log::info!("FrameHub: sender connected from {}", addr);
        Ok(Peer {
            addr,
            reader: BufReader::new(stream),
            writer,
        })
    }
}

fn send_ack(writer: &mut TcpStream) -> Result<()> {
    writer.write_all(ACK).context("send frame ack")?;
    writer.flush().context("flush frame ack")
}
