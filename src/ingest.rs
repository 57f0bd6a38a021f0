// THEORY:
// The ingest receiver is the single thread of the pipeline that owns things:
// it is the only writer of the frame store, the only caller into the video
// writer and the only reader of the recording control signal. One iteration =
// poll the control signal, receive the newest available message, decode,
// store, render, record, broadcast.
//
// The transport contract is conflate: whatever queued up between two receive
// calls, only the most recently published message is processed. After one
// message is awaited, every message that is already deliverable is drained
// without waiting and only the last survives. Receive failures are retried on
// the next iteration with no backoff; decode and render failures drop the
// sample and move on. Nothing here terminates the loop.

use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use futures::FutureExt;
use tokio::sync::watch;
use tracing::{debug, info, trace};
use zeromq::{Socket, SocketRecv, SubSocket};

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::overlay::OverlayRenderer;
use crate::recording::RecordingController;
use crate::sample::Sample;

/// Seam over the subscription socket so conflation is testable.
pub(crate) trait MessageSource {
    async fn recv_message(&mut self) -> Result<Bytes, PipelineError>;
}

impl MessageSource for SubSocket {
    async fn recv_message(&mut self) -> Result<Bytes, PipelineError> {
        let msg = SocketRecv::recv(self)
            .await
            .map_err(|e| PipelineError::Transport(e.to_string()))?;
        Ok(msg.get(0).cloned().unwrap_or_default())
    }
}

/// Awaits one message, then drains everything already queued and keeps only
/// the newest. Older messages are discarded with no error and no backlog.
pub(crate) async fn recv_latest<S: MessageSource>(source: &mut S) -> Result<Bytes, PipelineError> {
    let mut newest = source.recv_message().await?;
    while let Some(Ok(newer)) = source.recv_message().now_or_never() {
        newest = newer;
    }
    Ok(newest)
}

pub struct IngestReceiver {
    ctx: Arc<PipelineContext>,
    renderer: OverlayRenderer,
    recorder: RecordingController,
    toggle_rx: watch::Receiver<bool>,
}

impl IngestReceiver {
    pub(crate) fn new(
        ctx: Arc<PipelineContext>,
        renderer: OverlayRenderer,
        recorder: RecordingController,
        toggle_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            ctx,
            renderer,
            recorder,
            toggle_rx,
        }
    }

    /// Runs until process termination. Only subscription setup can fail.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let publisher = self.ctx.config.publisher.clone();
        let mut socket = SubSocket::new();
        socket
            .connect(&publisher)
            .await
            .with_context(|| format!("connecting to publisher {publisher}"))?;
        socket
            .subscribe("")
            .await
            .context("subscribing to vision stream")?;
        info!(publisher = %publisher, "subscribed to vision stream");

        loop {
            self.poll_recording_signal();
            let raw = match recv_latest(&mut socket).await {
                Ok(raw) => raw,
                Err(e) => {
                    trace!(error = %e, "receive failed, retrying");
                    continue;
                }
            };
            if let Err(e) = self.process_message(&raw) {
                debug!(error = %e, "dropping sample");
            }
        }
    }

    /// One pipeline iteration for one received message.
    fn process_message(&mut self, raw: &[u8]) -> Result<(), PipelineError> {
        let sample = Sample::decode(raw)?;
        // The raw frame is stored before any rendering so snapshots always
        // see clean bytes from the same sample the stream is derived from.
        self.ctx.store.set_raw(sample.image.clone());
        let annotated = self.renderer.render(&sample)?;
        self.recorder.write_frame(&annotated);
        self.ctx.frames.publish(annotated);
        Ok(())
    }

    /// Applies a pending recording toggle, if any. Called once per loop
    /// iteration, so toggle latency is bounded by the sample cadence.
    fn poll_recording_signal(&mut self) {
        if self.toggle_rx.has_changed().unwrap_or(false) {
            let desired = *self.toggle_rx.borrow_and_update();
            self.recorder.apply(desired);
        }
    }
}
