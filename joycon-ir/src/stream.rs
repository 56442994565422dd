//! Fragment reassembly and the streaming loop
//!
//! While streaming, the controller pushes one 300-byte fragment per report
//! and waits for an acknowledgement before sending the next one.
//! [`FragmentAssembler`] decides, for each report, what goes into the frame
//! buffer and what to answer; [`run`] drives it against the transport.
//!
//! # Fragment handling
//!
//! In priority order, for a fragment `got` after `previous`:
//!
//! | Case | Response | Buffer |
//! |------|----------|--------|
//! | `got` follows `previous` (mod fragment count) | ack `got` | written |
//! | first fragment 0 of a stream | ack `0` | written |
//! | `got == previous` | ack `got` | untouched |
//! | gap, no request pending | request `previous + 1` | written |
//! | gap on the 40x30 profile | ack `got` | written |
//! | `got` is the outstanding fragment | ack `got` | written |
//! | anything else | ack `got` | untouched |
//!
//! A frame is complete when its last fragment arrives in sequence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use joycon_ir_core::constants::FRAME_BUFFER_LEN;
use joycon_ir_core::exposure::white_pixel_percent;
use joycon_ir_core::{
    AutoExposure, CommandPacket, Fragment, Reply, ReportId, ResolutionProfile, RollingCounter,
};
use joycon_ir_transport::Transport;
use joycon_ir_types::Frame;

use crate::device::Device;
use crate::error::{Error, Result};

/// Receiver of completed frames
pub trait FrameSink: Send {
    fn on_frame(&mut self, frame: Frame);
}

impl<F> FrameSink for F
where
    F: FnMut(Frame) + Send,
{
    fn on_frame(&mut self, frame: Frame) {
        self(frame)
    }
}

/// What to send back for one report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Acknowledge a fragment index
    Ack(u8),

    /// Ask the device to resend from this fragment index
    RequestMissing(u8),

    /// Nothing to send
    None,
}

/// How a report was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentEvent {
    NextInSequence,
    Repeat,
    MissedRequested,
    GapAccepted,
    Recovered,
    Stale,
    StreamStart,
    /// Streaming report without a fragment
    EmptyReport,
    /// Not a streaming report (or nothing received)
    Ignored,
}

/// Result of feeding one report to the assembler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disposition {
    pub event: FragmentEvent,
    pub response: Response,

    /// White-pixel percentage to feed the auto-exposure controller
    pub exposure_sample: Option<u32>,

    /// The frame buffer holds a complete frame
    pub frame_complete: bool,
}

impl Disposition {
    fn new(event: FragmentEvent, response: Response) -> Self {
        Self {
            event,
            response,
            exposure_sample: None,
            frame_complete: false,
        }
    }

    fn ack(event: FragmentEvent, index: u8) -> Self {
        Self::new(event, Response::Ack(index))
    }
}

/// Fragment sequence tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceState {
    /// Last fragment accepted in order
    pub previous: u8,

    /// Fragment preceding a gap, remembered until it shows up
    pub outstanding: Option<u8>,

    /// A missed-fragment request is in flight
    pub request_pending: bool,

    /// Completed frames left in the auto-exposure warm-up
    pub warmup_remaining: u8,

    /// A fragment has been written since streaming started
    pub started: bool,
}

impl SequenceState {
    pub fn new(warmup_frames: u8) -> Self {
        Self {
            previous: 0,
            outstanding: None,
            request_pending: false,
            warmup_remaining: warmup_frames,
            started: false,
        }
    }
}

/// Streaming counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamStats {
    pub frames: u64,
    pub fragments_written: u64,
    pub repeats: u64,
    pub missed_requests: u64,
    pub gaps_accepted: u64,
    pub recovered: u64,
    pub stale: u64,
    pub empty_reports: u64,
    pub exposure_adjustments: u64,
}

impl StreamStats {
    fn record(&mut self, disposition: &Disposition) {
        match disposition.event {
            FragmentEvent::NextInSequence | FragmentEvent::StreamStart => {
                self.fragments_written += 1
            }
            FragmentEvent::Repeat => self.repeats += 1,
            FragmentEvent::MissedRequested => {
                self.missed_requests += 1;
                self.fragments_written += 1;
            }
            FragmentEvent::GapAccepted => {
                self.gaps_accepted += 1;
                self.fragments_written += 1;
            }
            FragmentEvent::Recovered => {
                self.recovered += 1;
                self.fragments_written += 1;
            }
            FragmentEvent::Stale => self.stale += 1,
            FragmentEvent::EmptyReport => self.empty_reports += 1,
            FragmentEvent::Ignored => {}
        }
        if disposition.frame_complete {
            self.frames += 1;
        }
        if disposition.exposure_sample.is_some() {
            self.exposure_adjustments += 1;
        }
    }
}

/// Fragment reassembly state machine
///
/// Pure: it never touches the transport. Feed it every received report with
/// [`on_report`](Self::on_report) and act on the returned [`Disposition`].
pub struct FragmentAssembler {
    profile: ResolutionProfile,
    buffer: Box<[u8]>,
    state: SequenceState,
    average_intensity: u8,
    white_pixels: u16,
}

impl FragmentAssembler {
    pub fn new(profile: ResolutionProfile, warmup_frames: u8) -> Self {
        Self {
            profile,
            buffer: vec![0u8; FRAME_BUFFER_LEN].into_boxed_slice(),
            state: SequenceState::new(warmup_frames),
            average_intensity: 0,
            white_pixels: 0,
        }
    }

    /// Sequence state
    pub fn state(&self) -> &SequenceState {
        &self.state
    }

    pub fn profile(&self) -> &ResolutionProfile {
        &self.profile
    }

    /// Bytes of the current frame
    pub fn frame_bytes(&self) -> &[u8] {
        &self.buffer[..self.profile.frame_len()]
    }

    /// Copy the current frame out of the buffer
    pub fn frame(&self, timestamp: DateTime<Utc>) -> Result<Frame> {
        let frame = Frame::new(
            timestamp,
            self.profile.width,
            self.profile.height,
            Bytes::copy_from_slice(self.frame_bytes()),
        )?;
        Ok(frame.with_brightness(self.average_intensity, self.white_pixels))
    }

    /// Classify one report and update the state
    pub fn on_report(&mut self, reply: &Reply) -> Disposition {
        if !reply.is_report(ReportId::McuData) {
            return Disposition::new(FragmentEvent::Ignored, Response::None);
        }

        match reply.fragment() {
            Some(fragment) => self.on_fragment(fragment),
            // Re-ack so the device leaves its high-latency fallback
            None => Disposition::ack(FragmentEvent::EmptyReport, self.state.previous),
        }
    }

    fn on_fragment(&mut self, fragment: Fragment<'_>) -> Disposition {
        let got = fragment.index();
        let previous = self.state.previous;

        if got == self.profile.next_fragment(previous) {
            return self.on_next(fragment);
        }

        if got == 0 && previous == 0 && !self.state.started {
            self.write(&fragment);
            self.state.previous = 0;
            return Disposition::ack(FragmentEvent::StreamStart, got);
        }

        if got == previous {
            self.state.request_pending = false;
            return Disposition::ack(FragmentEvent::Repeat, got);
        }

        if self.state.outstanding != Some(got) && !self.state.request_pending {
            self.write(&fragment);
            self.state.previous = got;

            if !self.profile.supports_missed_fragment_requests() {
                return Disposition::ack(FragmentEvent::GapAccepted, got);
            }

            let wanted = self.profile.next_fragment(previous);
            self.state.outstanding = Some(self.profile.previous_fragment(got));
            self.state.request_pending = true;
            debug!(previous, got, wanted, "Missed fragment, requesting it");
            return Disposition::new(FragmentEvent::MissedRequested, Response::RequestMissing(wanted));
        }

        if self.state.outstanding == Some(got) {
            self.write(&fragment);
            self.state.outstanding = None;
            self.state.request_pending = false;
            debug!(got, "Recovered missed fragment");
            return Disposition::ack(FragmentEvent::Recovered, got);
        }

        trace!(got, previous, "Stale fragment");
        Disposition::ack(FragmentEvent::Stale, got)
    }

    fn on_next(&mut self, fragment: Fragment<'_>) -> Disposition {
        let got = fragment.index();
        self.write(&fragment);
        self.state.previous = got;

        let mut disposition = Disposition::ack(FragmentEvent::NextInSequence, got);

        if got == 0 && self.state.warmup_remaining > 0 {
            disposition.exposure_sample = Some(white_pixel_percent(fragment.white_pixels()));
        }

        if got == self.profile.max_fragment_index {
            disposition.frame_complete = true;
            self.state.warmup_remaining = self.state.warmup_remaining.saturating_sub(1);
        }

        disposition
    }

    fn write(&mut self, fragment: &Fragment<'_>) {
        let offset = self.profile.fragment_offset(fragment.index());
        let payload = fragment.payload();
        self.buffer[offset..offset + payload.len()].copy_from_slice(payload);
        self.state.started = true;
        self.average_intensity = fragment.average_intensity();
        self.white_pixels = fragment.white_pixels();
    }
}

/// Streaming loop
///
/// Sends the initial ack, then receives and answers reports until `stop` is
/// raised. The stop flag is checked once per iteration. A transport error
/// ends the loop immediately.
pub(crate) async fn run<S>(
    transport: &mut dyn Transport,
    counter: &mut RollingCounter,
    assembler: &mut FragmentAssembler,
    exposure: &mut AutoExposure,
    sink: &mut S,
    stop: &AtomicBool,
    timeout: Duration,
) -> Result<StreamStats>
where
    S: FrameSink + ?Sized,
{
    let mut stats = StreamStats::default();
    let mut reply = Reply::new();

    send(transport, CommandPacket::fragment_ack(counter, 0)).await?;

    while !stop.load(Ordering::Acquire) {
        reply.clear();
        let n = transport.receive(reply.buffer_mut(), timeout).await?;
        reply.set_len(n);

        let disposition = assembler.on_report(&reply);
        stats.record(&disposition);

        match disposition.response {
            Response::Ack(index) => {
                send(transport, CommandPacket::fragment_ack(counter, index)).await?
            }
            Response::RequestMissing(index) => {
                send(transport, CommandPacket::missed_fragment_request(counter, index)).await?
            }
            Response::None => {}
        }

        if let Some(percent) = disposition.exposure_sample {
            let setting = exposure.adjust(percent);
            send(transport, CommandPacket::exposure(counter, setting)).await?;
        }

        if disposition.frame_complete {
            let frame = assembler.frame(Utc::now())?;
            trace!("Frame complete: {}", frame);
            sink.on_frame(frame);
        }
    }

    info!(
        frames = stats.frames,
        missed = stats.missed_requests,
        recovered = stats.recovered,
        "Streaming stopped"
    );
    Ok(stats)
}

async fn send(transport: &mut dyn Transport, packet: CommandPacket) -> Result<()> {
    trace!("Sending: {:?}", packet);
    transport
        .send(packet.report_id().into(), packet.as_bytes())
        .await?;
    Ok(())
}

/// Handle to a streaming worker task
///
/// Dropping the handle raises the stop flag without waiting; call
/// [`stop`](Self::stop) to get the device back.
pub struct StreamHandle {
    stop: Arc<AtomicBool>,
    task: Option<JoinHandle<(Device, Result<StreamStats>)>>,
}

impl StreamHandle {
    pub(crate) fn new(
        stop: Arc<AtomicBool>,
        task: JoinHandle<(Device, Result<StreamStats>)>,
    ) -> Self {
        Self {
            stop,
            task: Some(task),
        }
    }

    /// Ask the worker to stop without waiting for it
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Check if the worker has exited
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Stop the worker and wait until it has sent the stop command and
    /// released the channel
    ///
    /// Returns the device (closed) and the streaming result.
    pub async fn stop(mut self) -> Result<(Device, StreamStats)> {
        self.request_stop();

        let task = self
            .task
            .take()
            .ok_or_else(|| Error::WorkerFailed("worker already joined".to_string()))?;

        let (device, result) = task.await.map_err(|e| {
            warn!("Streaming worker panicked or was cancelled: {}", e);
            Error::WorkerFailed(e.to_string())
        })?;

        Ok((device, result?))
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            debug!("Stream handle dropped, stopping worker");
        }
        self.request_stop();
    }
}
