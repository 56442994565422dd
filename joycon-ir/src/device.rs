//! High-level device interface

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::{debug, info, warn};

use joycon_ir_core::{AutoExposure, LinkState, Session};
use joycon_ir_transport::{HidTransport, Transport};
use joycon_ir_types::ControllerInfo;

use crate::config::DeviceConfig;
use crate::error::Result;
use crate::handshake::{self, Handshake, HandshakeReport, Link};
use crate::stream::{self, FragmentAssembler, FrameSink, StreamHandle, StreamStats};

/// Joy-Con IR camera
///
/// Owns the channel and every piece of protocol state. All device I/O goes
/// through `&mut self`, so commands are never issued concurrently.
///
/// # Examples
///
/// ```no_run
/// use std::sync::atomic::AtomicBool;
/// use joycon_ir::{Device, DeviceConfig, Resolution};
///
/// #[tokio::main]
/// async fn main() -> joycon_ir::Result<()> {
///     let config = DeviceConfig::default().with_resolution(Resolution::P120);
///     let mut device = Device::new(config);
///
///     let report = device.connect().await?;
///     println!("Connected: {}", report.info);
///
///     let stop = AtomicBool::new(false);
///     let mut sink = |frame: joycon_ir::Frame| println!("{}", frame);
///     device.stream(&mut sink, &stop).await?;
///     Ok(())
/// }
/// ```
pub struct Device {
    transport: Box<dyn Transport>,
    session: Session,
    config: DeviceConfig,
    exposure: AutoExposure,
    info: Option<ControllerInfo>,
}

impl Device {
    /// Create a device using the HID transport
    pub fn new(config: DeviceConfig) -> Self {
        let transport = HidTransport::new(config.vendor_id, config.product_id);
        Self::with_transport(config, transport)
    }

    /// Create a device on a custom transport
    pub fn with_transport(config: DeviceConfig, transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            session: Session::new(),
            exposure: AutoExposure::new(config.initial_exposure_us),
            config,
            info: None,
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Lifecycle state
    pub fn state(&self) -> LinkState {
        self.session.state()
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.session.is_connected() && self.transport.is_open()
    }

    /// Controller information read during the handshake
    pub fn info(&self) -> Option<&ControllerInfo> {
        self.info.as_ref()
    }

    /// Current exposure (microseconds)
    pub fn exposure_us(&self) -> u16 {
        self.exposure.current()
    }

    /// Open the channel and run the handshake
    ///
    /// On failure the channel is closed again and the error names the
    /// handshake step that failed (see [`Error::step_code`](crate::Error::step_code)).
    pub async fn connect(&mut self) -> Result<HandshakeReport> {
        if self.session.state() == LinkState::Closed {
            self.session.reset();
        }
        self.session.ensure(LinkState::Disconnected, "connect")?;

        info!("Opening {}...", self.transport.describe());
        self.transport.open().await?;

        self.exposure = AutoExposure::new(self.config.initial_exposure_us);
        let result = Handshake::new(self.transport.as_mut(), &mut self.session, &self.config)
            .run()
            .await;

        match result {
            Ok(report) => {
                info!("Connected to {}", self.transport.describe());
                self.info = Some(report.info.clone());
                Ok(report)
            }
            Err(e) => {
                warn!("Handshake failed: {}", e);
                self.force_close().await;
                Err(e)
            }
        }
    }

    /// Stream frames into `sink` until `stop` is raised
    ///
    /// Requires a completed handshake. When the loop ends the stop command is
    /// sent and the channel released, whatever the outcome.
    pub async fn stream<S>(&mut self, sink: &mut S, stop: &AtomicBool) -> Result<StreamStats>
    where
        S: FrameSink + ?Sized,
    {
        self.session.ensure(LinkState::Ready, "start streaming")?;
        self.session.transition(LinkState::Streaming)?;

        let profile = self.config.profile();
        info!(
            resolution = %self.config.resolution,
            fragments = profile.fragment_count(),
            "Streaming started"
        );

        let mut assembler = FragmentAssembler::new(profile, self.config.warmup_frames);
        let result = stream::run(
            self.transport.as_mut(),
            self.session.counter(),
            &mut assembler,
            &mut self.exposure,
            sink,
            stop,
            self.config.stream_timeout,
        )
        .await;

        let stats = match result {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Streaming failed: {}", e);
                self.force_close().await;
                return Err(e);
            }
        };

        self.session.transition(LinkState::Stopping)?;
        self.shutdown().await?;
        Ok(stats)
    }

    /// Move the device into a streaming task
    ///
    /// The device must have completed its handshake.
    pub fn spawn_stream<S>(mut self, mut sink: S) -> StreamHandle
    where
        S: FrameSink + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);

        let task = tokio::spawn(async move {
            let result = self.stream(&mut sink, &flag).await;
            (self, result)
        });

        StreamHandle::new(stop, task)
    }

    /// Stop streaming mode and close the channel
    pub async fn disconnect(&mut self) -> Result<()> {
        if !self.session.is_connected() {
            if self.transport.is_open() {
                self.transport.close().await?;
            }
            return Ok(());
        }

        info!("Disconnecting from {}...", self.transport.describe());

        if self.session.state() == LinkState::Ready {
            self.session.transition(LinkState::Stopping)?;
            self.shutdown().await
        } else {
            self.force_close().await;
            Ok(())
        }
    }

    /// Send the stop command, then release the channel
    async fn shutdown(&mut self) -> Result<()> {
        let mut link = Link::new(self.transport.as_mut(), &mut self.session);
        let stopped = handshake::stop_streaming(&mut link, self.config.poll_timeout).await;

        match &stopped {
            Ok(true) => debug!("Stop command acknowledged"),
            Ok(false) => warn!("Stop command not acknowledged"),
            Err(e) => warn!("Failed to send stop command: {}", e),
        }

        let closed = self.transport.close().await;
        self.session.transition(LinkState::Closed)?;
        info!("Disconnected");

        stopped?;
        closed?;
        Ok(())
    }

    /// Close the channel after an error
    async fn force_close(&mut self) {
        if let Err(e) = self.transport.close().await {
            warn!("Failed to close transport: {}", e);
        }
        self.session.close();
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if self.session.is_connected() {
            warn!("Device dropped while {}", self.session.state());
        }
    }
}
