//! Control socket between `quakectl` and the daemon
//!
//! Each connection carries one request and one response, framed as a 4-byte
//! little-endian length followed by a JSON body.

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::{timeout, Duration};
use tracing::debug;

pub mod protocol;
pub mod server;

pub use protocol::{get_socket_path, ClientMessage, DaemonResponse};
pub use server::IpcServer;

/// Largest frame either side accepts
const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Toggles may wait for a launch, so leave room past the launch timeout
const CLIENT_TIMEOUT: Duration = Duration::from_secs(15);

pub async fn read_frame<R, T>(reader: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    // Read message length first (4 bytes)
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let msg_len = u32::from_le_bytes(len_buf) as usize;
    if msg_len > MAX_FRAME_LEN {
        anyhow::bail!("Frame of {} bytes exceeds limit of {}", msg_len, MAX_FRAME_LEN);
    }

    let mut msg_buf = vec![0u8; msg_len];
    reader.read_exact(&mut msg_buf).await?;
    Ok(serde_json::from_slice(&msg_buf)?)
}

pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let data = serde_json::to_vec(value)?;
    let len = u32::try_from(data.len())?.to_le_bytes();
    writer.write_all(&len).await?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

/// Send one message to the daemon listening on `socket_path`
pub async fn send_message(socket_path: &str, message: &ClientMessage) -> Result<DaemonResponse> {
    debug!("📤 Sending {:?} to {}", message, socket_path);

    let exchange = async {
        let mut stream = UnixStream::connect(socket_path).await.map_err(|e| {
            anyhow::anyhow!("Cannot reach daemon at {} ({}); is quakeland running?", socket_path, e)
        })?;
        write_frame(&mut stream, message).await?;
        read_frame(&mut stream).await
    };

    timeout(CLIENT_TIMEOUT, exchange)
        .await
        .map_err(|_| anyhow::anyhow!("Daemon did not answer within {:?}", CLIENT_TIMEOUT))?
}
