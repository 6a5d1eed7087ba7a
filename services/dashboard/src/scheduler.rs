//! Refresh, render, display on a fixed cadence.
//!
//! One cycle runs to completion before the next starts. A cycle that reports
//! a WebSocket handshake failure or a sink error is retried after the shorter
//! retry delay instead of the normal interval.

use std::time::Duration;

use anyhow::Result;
use dashboard_common::Snapshot;
use hub_client::Updater;
use renderer::{Renderer, Rotation, TextFace};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::sink::DisplaySink;

/// How a cycle ended, which decides the wait before the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    /// Every field refreshed and the frame was displayed
    Complete,
    /// Displayed, but some fields kept their previous values
    Partial,
    /// The hub broke the WebSocket handshake; the frame was still displayed
    /// from what could be fetched
    Failed,
}

#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub interval: Duration,
    pub retry: Duration,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            retry: Duration::from_secs(60),
        }
    }
}

impl Schedule {
    /// Wait after a cycle with the given status.
    pub fn delay_after(&self, status: CycleStatus) -> Duration {
        match status {
            CycleStatus::Complete | CycleStatus::Partial => self.interval,
            CycleStatus::Failed => self.retry,
        }
    }
}

/// Owns the snapshot and drives the update/render/display pipeline.
pub struct Scheduler<F, S> {
    updater: Updater,
    renderer: Renderer<F>,
    sink: S,
    rotation: Rotation,
    schedule: Schedule,
    snapshot: Snapshot,
}

impl<F: TextFace, S: DisplaySink> Scheduler<F, S> {
    pub fn new(
        updater: Updater,
        renderer: Renderer<F>,
        sink: S,
        rotation: Rotation,
        schedule: Schedule,
    ) -> Self {
        Self {
            updater,
            renderer,
            sink,
            rotation,
            schedule,
            snapshot: Snapshot::new(),
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// One update, render and display. Only a sink failure is an error.
    pub async fn run_cycle(&mut self) -> Result<CycleStatus> {
        let status = match self.updater.update(&mut self.snapshot).await {
            Ok(report) if report.is_complete() => CycleStatus::Complete,
            Ok(report) => {
                warn!(stale = ?report.stale_fields(), "Displaying partially stale snapshot");
                CycleStatus::Partial
            }
            Err(e) => {
                error!(error = %e, kind = ?e.source.kind(), stale = ?e.report.stale_fields(), "Update cycle failed");
                CycleStatus::Failed
            }
        };

        let frame = self.renderer.render(&self.snapshot);
        self.sink.display(&frame, self.rotation)?;

        Ok(status)
    }

    /// Run cycles until a shutdown signal arrives.
    pub async fn run_forever(&mut self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        loop {
            let delay = match self.run_cycle().await {
                Ok(status) => {
                    info!(?status, "Cycle finished");
                    self.schedule.delay_after(status)
                }
                Err(e) => {
                    error!(error = %e, "Failed to display frame");
                    self.schedule.retry
                }
            };

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutting down scheduler");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        Ok(())
    }
}
