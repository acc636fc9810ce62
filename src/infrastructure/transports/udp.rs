use crate::domain::ports::WireHandler;
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// One datagram is one frame. Collectd's default packet limit is 1452
/// bytes but jumbo configurations go far beyond it.
const MAX_DATAGRAM: usize = 64 * 1024;

/// Every Nth decode failure is logged at warn so a misconfigured sender
/// shows up without flooding the log.
const DECODE_WARN_EVERY: u64 = 100;

/// Listens on a UDP socket and feeds each datagram to its wire handler.
pub struct UdpTransport {
    socket: UdpSocket,
    handler: Arc<dyn WireHandler>,
}

impl UdpTransport {
    pub async fn bind(address: &str, handler: Arc<dyn WireHandler>) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(address)
            .await
            .with_context(|| format!("Failed to bind udp listener on {}", address))?;
        info!(
            address = %socket.local_addr()?,
            handler = handler.kind(),
            "udp listener bound"
        );
        Ok(Self { socket, handler })
    }

    /// The bound address, with the OS-assigned port filled in (for testing).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive loop. Runs until cancelled; socket errors back off rather
    /// than kill the listener.
    pub async fn run(self, cancel: CancellationToken) {
        let mut buffer = vec![0u8; MAX_DATAGRAM];
        let mut decode_failures: u64 = 0;

        loop {
            tokio::select! {
                received = self.socket.recv_from(&mut buffer) => {
                    match received {
                        Ok((length, peer)) => {
                            match self.handler.handle(&buffer[..length]).await {
                                Ok(published) => {
                                    debug!(
                                        handler = self.handler.kind(),
                                        %peer,
                                        length,
                                        published,
                                        "datagram decoded"
                                    );
                                }
                                Err(err) => {
                                    decode_failures += 1;
                                    if decode_failures % DECODE_WARN_EVERY == 1 {
                                        warn!(
                                            handler = self.handler.kind(),
                                            %peer,
                                            failures = decode_failures,
                                            error = %err,
                                            "datagram rejected"
                                        );
                                    } else {
                                        debug!(
                                            handler = self.handler.kind(),
                                            %peer,
                                            error = %err,
                                            "datagram rejected"
                                        );
                                    }
                                }
                            }
                        }
                        Err(err) => {
                            error!(handler = self.handler.kind(), error = %err, "udp receive failed");
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    info!(handler = self.handler.kind(), "udp listener stopping");
                    return;
                }
            }
        }
    }
}
