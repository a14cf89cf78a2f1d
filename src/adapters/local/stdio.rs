//! JSON-lines gateway: one inbound event per input line, one result per
//! output line.

use crate::ports::gateway::{EventGateway, GatewayError};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines, Stdin, Stdout,
};
use tokio::sync::Mutex;

pub struct StdioGateway<R, W> {
    lines: Mutex<Lines<R>>,
    writer: Mutex<W>,
}

impl StdioGateway<BufReader<Stdin>, Stdout> {
    /// Read from the process stdin, write to the process stdout.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> StdioGateway<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
            writer: Mutex::new(writer),
        }
    }

    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<R, W> EventGateway for StdioGateway<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn receive(&self) -> Result<Option<Bytes>, GatewayError> {
        let mut lines = self.lines.lock().await;
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => Ok(None),
            Ok(Some(line)) => Ok(Some(Bytes::from(line))),
            Ok(None) => Err(GatewayError::Closed),
            Err(e) => Err(GatewayError::Receive(e.to_string())),
        }
    }

    async fn publish(&self, payload: Bytes) -> Result<(), GatewayError> {
        let mut writer = self.writer.lock().await;
        async {
            writer.write_all(&payload).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await
        .map_err(|e| GatewayError::Publish(e.to_string()))
    }

    /// Lines are consumed as they are read; nothing to acknowledge.
    async fn ack(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}
