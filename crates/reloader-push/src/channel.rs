//! Outbound streaming connection to one device

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use reloader_core::prelude::*;
use reloader_core::DeviceTarget;

/// Bytes per write; the receiver reads until end of stream regardless
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Port the on-device receiver listens on
pub const DEFAULT_PUSH_PORT: u16 = 8050;

/// Connection parameters shared by every channel in a push
#[derive(Debug, Clone, Copy)]
pub struct ChannelConfig {
    /// Only the connect is bounded; sends wait on the peer indefinitely
    pub connect_timeout: Duration,
    pub chunk_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// An open stream to one device
#[derive(Debug)]
pub struct TransferChannel {
    stream: TcpStream,
    endpoint: String,
    chunk_size: usize,
    bytes_sent: u64,
}

impl TransferChannel {
    /// Connect to `target.address:target.port` within `config.connect_timeout`.
    ///
    /// A connect that does not complete in time is abandoned and reported as
    /// [`Error::ConnectTimeout`]; any other failure is [`Error::Connect`].
    pub async fn open(target: &DeviceTarget, config: &ChannelConfig) -> Result<Self> {
        let endpoint = target.endpoint();
        info!("Connecting to {}", endpoint);

        let connect = TcpStream::connect((target.address.as_str(), target.port));
        let stream = match timeout(config.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(Error::connect(endpoint, e)),
            Err(_) => {
                return Err(Error::ConnectTimeout {
                    address: endpoint,
                    timeout_ms: config.connect_timeout.as_millis() as u64,
                })
            }
        };

        Ok(Self {
            stream,
            endpoint,
            chunk_size: config.chunk_size.max(1),
            bytes_sent: 0,
        })
    }

    /// Stream all of `source` in order, then close the write half.
    ///
    /// Closing is the only end-of-artifact signal; the receiver sends no
    /// acknowledgement. Returns the number of bytes written.
    pub async fn send<R>(&mut self, source: &mut R) -> Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let endpoint = self.endpoint.clone();
        let sent = &mut self.bytes_sent;

        copy_in_chunks(source, &mut self.stream, self.chunk_size, |index, len| {
            *sent += len as u64;
            trace!("Sent chunk {} ({} bytes) to {}", index, len, endpoint);
        })
        .await
        .map_err(|e| Error::transfer(&self.endpoint, e))?;

        self.stream
            .shutdown()
            .await
            .map_err(|e| Error::transfer(&self.endpoint, e))?;

        Ok(self.bytes_sent)
    }

    /// Bytes acknowledged by the transport so far, including partial sends
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Read `source` into fixed-size chunks and write each one fully to `sink`.
///
/// Every chunk except the last is exactly `chunk_size` bytes, even when the
/// source hands out short reads. `on_chunk(index, len)` runs after each write.
async fn copy_in_chunks<R, W, F>(
    source: &mut R,
    sink: &mut W,
    chunk_size: usize,
    mut on_chunk: F,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
    F: FnMut(usize, usize),
{
    let mut buf = vec![0u8; chunk_size];
    let mut total = 0u64;
    let mut index = 0usize;

    loop {
        let mut filled = 0;
        while filled < chunk_size {
            let n = source.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            break;
        }

        sink.write_all(&buf[..filled]).await?;
        total += filled as u64;
        on_chunk(index, filled);
        index += 1;

        if filled < chunk_size {
            break;
        }
    }

    sink.flush().await?;
    Ok(total)
}
