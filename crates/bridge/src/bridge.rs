//! Forwarding loop: meter lines in, samples POSTed, answers printed

use crate::client::PredictClient;
use crate::output;
use crate::source::{next_line, LineSource};
use anyhow::Result;
use meter_lib::frame::FrameAssembler;
use meter_lib::IngestRequest;
use std::time::Duration;
use tokio::io::AsyncBufRead;
use tracing::{debug, info, warn};

/// Counters for one bridge run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub lines: u64,
    pub posted: u64,
    pub failed: u64,
}

pub struct Bridge {
    source: LineSource,
    client: PredictClient,
    retry: Duration,
    assembler: FrameAssembler,
    stats: BridgeStats,
}

impl Bridge {
    pub fn new(source: LineSource, client: PredictClient, retry: Duration) -> Self {
        Self {
            source,
            client,
            retry,
            assembler: FrameAssembler::new(),
            stats: BridgeStats::default(),
        }
    }

    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    /// Read and forward until stdin ends. Device sources are reopened after
    /// `retry` whenever they fail or reach end of input.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            output::print_info(&format!("Connecting to {} ...", self.source));
            let reader = match self.source.open().await {
                Ok(reader) => reader,
                Err(e) => {
                    output::print_error(&format!("{e:#}"));
                    self.wait_retry().await;
                    continue;
                }
            };
            output::print_info("Connected. Reading lines...");

            match self.forward(reader).await {
                Ok(()) if !self.source.reconnects() => {
                    info!(
                        lines = self.stats.lines,
                        posted = self.stats.posted,
                        failed = self.stats.failed,
                        "Input closed"
                    );
                    return Ok(());
                }
                Ok(()) => warn!(source = %self.source, "Meter stream ended"),
                Err(e) => output::print_error(&format!("Read error: {e:#}")),
            }
            self.wait_retry().await;
        }
    }

    /// Forward every completed sample read from `reader` until end of input
    pub async fn forward<R: AsyncBufRead + Unpin + ?Sized>(
        &mut self,
        mut reader: Box<R>,
    ) -> Result<()> {
        let mut buf = Vec::new();
        while let Some(line) = next_line(&mut *reader, &mut buf).await? {
            self.stats.lines += 1;
            let Some(sample) = self.assembler.push_line(&line) else {
                continue;
            };
            debug!(timestamp = %sample.timestamp, total_power = sample.total_power, "Sample assembled");

            let request = IngestRequest::from(&sample);
            match self.client.post(&request).await {
                Ok(response) => {
                    self.stats.posted += 1;
                    output::print_response(&sample.timestamp, &response);
                }
                Err(e) => {
                    self.stats.failed += 1;
                    output::print_error(&format!("POST failed: {e:#}"));
                }
            }
        }
        Ok(())
    }

    async fn wait_retry(&self) {
        output::print_warning(&format!("Retrying in {}s...", self.retry.as_secs()));
        tokio::time::sleep(self.retry).await;
    }
}
