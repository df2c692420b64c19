use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::{select, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Largest chunk moved per read
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// How often an idle relay wakes up between reads
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// RelayStats counts the bytes moved in each direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub client_to_upstream: u64,
    pub upstream_to_client: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    ReadPending,
    Done,
}

/// Relay copies bytes between a client and an upstream channel until both
/// directions have seen end-of-stream
#[derive(Debug, Clone, Copy)]
pub struct Relay {
    pub chunk_size: usize,
    pub poll_interval: Duration,
}

impl Relay {
    pub fn new(chunk_size: usize, poll_interval: Duration) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            poll_interval,
        }
    }

    /// run relays until both directions are done, an I/O error occurs on
    /// either channel, or `cancel` fires.
    ///
    /// End-of-stream on one side shuts down the write half of the other side
    /// and leaves the opposite direction running. Cancellation also aborts a
    /// read or write that is still in progress.
    pub async fn run<A, B>(
        &self,
        client: &mut A,
        upstream: &mut B,
        cancel: &CancellationToken,
    ) -> io::Result<RelayStats>
    where
        A: AsyncRead + AsyncWrite + Unpin,
        B: AsyncRead + AsyncWrite + Unpin,
    {
        let mut stats = RelayStats::default();
        let copied = {
            let copy = self.copy(client, upstream, cancel, &mut stats);
            select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("relay cancelled");
                    Ok(())
                }
                res = copy => res,
            }
        };
        copied?;

        Ok(stats)
    }

    async fn copy<A, B>(
        &self,
        client: &mut A,
        upstream: &mut B,
        cancel: &CancellationToken,
        stats: &mut RelayStats,
    ) -> io::Result<()>
    where
        A: AsyncRead + AsyncWrite + Unpin,
        B: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut client_r, mut client_w) = tokio::io::split(client);
        let (mut upstream_r, mut upstream_w) = tokio::io::split(upstream);

        let mut outbound = Direction::ReadPending;
        let mut inbound = Direction::ReadPending;
        let mut outbound_buf = vec![0u8; self.chunk_size];
        let mut inbound_buf = vec![0u8; self.chunk_size];

        while outbound == Direction::ReadPending || inbound == Direction::ReadPending {
            if cancel.is_cancelled() {
                break;
            }

            select! {
                res = client_r.read(&mut outbound_buf), if outbound == Direction::ReadPending => {
                    match res? {
                        0 => {
                            debug!("client finished sending");
                            upstream_w.shutdown().await?;
                            outbound = Direction::Done;
                        }
                        n => {
                            upstream_w.write_all(&outbound_buf[..n]).await?;
                            upstream_w.flush().await?;
                            stats.client_to_upstream += n as u64;
                        }
                    }
                }
                res = upstream_r.read(&mut inbound_buf), if inbound == Direction::ReadPending => {
                    match res? {
                        0 => {
                            debug!("upstream finished sending");
                            client_w.shutdown().await?;
                            inbound = Direction::Done;
                        }
                        n => {
                            client_w.write_all(&inbound_buf[..n]).await?;
                            client_w.flush().await?;
                            stats.upstream_to_client += n as u64;
                        }
                    }
                }
                _ = sleep(self.poll_interval) => {}
            }
        }

        Ok(())
    }
}
