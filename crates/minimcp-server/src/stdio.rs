//! Line-delimited stdio transport.
//!
//! One JSON-RPC message per line in each direction. Every non-empty input
//! line is handled on its own task, so a slow tool never blocks the read
//! loop; a single writer task owns the output and writes whole lines.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::responder::NotificationSink;
use crate::server::MiniMcp;

pub struct StdioTransport {
    server: MiniMcp,
}

impl StdioTransport {
    pub fn new(server: MiniMcp) -> Self {
        Self { server }
    }

    /// Serve the process's stdin/stdout until stdin closes.
    pub async fn run(&self) -> std::io::Result<()> {
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve any reader/writer pair until the reader reaches EOF, then wait
    /// for in-flight messages to finish and their replies to be written.
    pub async fn serve<R, W>(&self, mut reader: R, writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let writer_task = tokio::spawn(write_lines(writer, rx));
        let mut in_flight = JoinSet::new();
        let mut buf = Vec::new();

        info!("stdio transport started");
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            let line = buf.trim_ascii().to_vec();
            if line.is_empty() {
                continue;
            }

            let server = self.server.clone();
            let tx = tx.clone();
            in_flight.spawn(async move {
                let sink: Arc<dyn NotificationSink> = Arc::new(tx.clone());
                let reply = match server.handle_bytes(&line, Some(sink), None).await {
                    Ok(result) => result.into_text(),
                    Err(invalid) => {
                        warn!("Invalid message on stdin: {}", invalid);
                        Some(invalid.to_json())
                    }
                };
                if let Some(reply) = reply {
                    if tx.send(reply).is_err() {
                        debug!("stdout writer gone; dropping reply");
                    }
                }
            });

            while let Some(done) = in_flight.try_join_next() {
                if let Err(e) = done {
                    error!("Message task failed: {}", e);
                }
            }
        }

        debug!("stdin closed; waiting for {} in-flight messages", in_flight.len());
        while let Some(done) = in_flight.join_next().await {
            if let Err(e) = done {
                error!("Message task failed: {}", e);
            }
        }
        drop(tx);

        let result = writer_task
            .await
            .map_err(|e| std::io::Error::other(format!("stdout writer task failed: {}", e)))?;
        info!("stdio transport stopped");
        result
    }
}

async fn write_lines<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<String>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}
