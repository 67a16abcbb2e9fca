use std::io::{self, Write};

use env_logger::Builder;
use log::LevelFilter;
use tokio::{
    fs::{create_dir_all, metadata, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
};
use tokio_util::sync::CancellationToken;

use crate::{
    config,
    core::{AggregateResult, ErrorContext},
};

/// Initialise `env_logger` writing to stderr. `RUST_LOG` overrides the
/// default `info` level.
pub fn init_stderr_logger() -> AggregateResult<()> {
    Builder::new()
        .filter(None, LevelFilter::Info)
        .parse_default_env()
        .try_init()
        .with_context("Failed to initialise logger")
}

/// `io::Write` end of the log channel
pub struct AsyncWriter {
    sender: UnboundedSender<Vec<u8>>,
}

impl Write for AsyncWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let data = buf.to_vec();
        self.sender
            .send(data)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Log sink appending formatted records to the configured file from a
/// background task
pub struct Logger {
    sender: UnboundedSender<Vec<u8>>,
    receiver: UnboundedReceiver<Vec<u8>>,
    config: config::Log,
}

impl Logger {
    pub fn new(config: config::Log) -> Self {
        let (sender, receiver) = unbounded_channel::<Vec<u8>>();
        Self {
            sender,
            receiver,
            config,
        }
    }

    pub fn create_async_writer(&self) -> AsyncWriter {
        AsyncWriter {
            sender: self.sender.clone(),
        }
    }

    /// Route the global logger through this sink. `run` must be spawned for
    /// records to reach the file.
    pub fn init_env_logger(&self) -> AggregateResult<()> {
        let writer = self.create_async_writer();
        Builder::new()
            .filter(None, LevelFilter::Info)
            .parse_default_env()
            .target(env_logger::Target::Pipe(Box::new(writer)))
            .try_init()
            .with_context("Failed to initialise logger")
    }

    /// Append records until `shutdown` fires or every writer is dropped.
    pub async fn run(self, shutdown: CancellationToken) -> AggregateResult<()> {
        let Logger {
            sender,
            mut receiver,
            config,
        } = self;
        drop(sender);

        let log_file_path = &config.path;
        if let Some(parent) = std::path::Path::new(log_file_path).parent() {
            if !parent.as_os_str().is_empty() && metadata(parent).await.is_err() {
                create_dir_all(parent)
                    .await
                    .with_context("Failed to create log path")?;
            }
        }

        let mut file = BufWriter::new(
            OpenOptions::new()
                .append(true)
                .create(true)
                .open(log_file_path)
                .await
                .with_context("Failed to open or create log file")?,
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    log::info!("Shutdown signal received, stopping write log");
                    while let Ok(data) = receiver.try_recv() {
                        if let Err(e) = file.write_all(&data).await {
                            log::error!("Failed to write to log file: {}", e);
                        }
                    }
                    break;
                }

                data = receiver.recv() => {
                    match data {
                        Some(data) => {
                            if let Err(e) = file.write_all(&data).await {
                                log::error!("Failed to write to log file: {}", e);
                            }
                        }
                        None => {
                            log::info!("Log channel closed, stopping write log");
                            break;
                        }
                    }
                }
            }
        }

        file.flush().await.with_context("Failed to flush log file")
    }
}
