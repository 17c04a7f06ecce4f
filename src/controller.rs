use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::conversion::{ConversionConfig, ConvertedSession};
use crate::device::{DaqDevice, DeviceError};
use crate::session::{AcquisitionSession, CompletedSession};
use crate::sink::{SessionSink, SinkError};
use crate::stream_config::StreamConfig;
use crate::trigger::{wait_for_start, PollPolicy, TriggerReader, WaitOutcome};

/// Anything that ends the acquisition loop. Packet level anomalies never show
/// up here; they are logged and counted inside the session.
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Acquisition was interrupted")]
    Interrupted,
}

/// Returned once the loop has given up and the device has been reset and closed.
#[derive(Debug, thiserror::Error)]
#[error("Acquisition stopped after {sessions_completed} completed session(s): {cause}")]
pub struct FatalShutdown {
    #[source]
    pub cause: AcquisitionError,
    pub sessions_completed: u64,
}

#[derive(Debug, Clone, Default)]
pub struct AcquisitionConfig {
    pub stream: StreamConfig,
    pub conversion: ConversionConfig,
    pub poll: PollPolicy,
}

#[derive(Debug)]
pub enum SessionOutcome {
    /// Converted and handed to the sink.
    Completed(CompletedSession),
    /// Stop arrived before any reading; nothing was emitted.
    Discarded(CompletedSession),
}

/// Owns the device, trigger and sink for the lifetime of the process:
/// prepare once, run sessions until something fails, then reset and close.
pub struct AcquisitionLoop<D, T, S> {
    device: D,
    trigger: T,
    sink: S,
    config: AcquisitionConfig,
    interrupt: Option<Arc<AtomicBool>>,
    sessions_completed: u64,
}

impl<D, T, S> AcquisitionLoop<D, T, S>
where
    D: DaqDevice,
    T: TriggerReader<D>,
    S: SessionSink,
{
    pub fn new(device: D, trigger: T, sink: S, config: AcquisitionConfig) -> Self {
        Self {
            device,
            trigger,
            sink,
            config,
            interrupt: None,
            sessions_completed: 0,
        }
    }

    /// Setting the flag makes the loop fail with [`AcquisitionError::Interrupted`]
    /// at the next trigger poll or packet.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn sessions_completed(&self) -> u64 {
        self.sessions_completed
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Load calibration, set up the trigger input and configure the stream.
    pub fn prepare(&mut self) -> Result<(), AcquisitionError> {
        log::debug!("Loading device calibration");
        self.device.set_calibration()?;
        self.device.configure_digital_inputs()?;
        self.device.configure_stream(&self.config.stream)?;

        let scan_period = self.config.stream.scan_period().as_secs_f64();
        if (scan_period - self.config.conversion.sample_period).abs() > 1e-9 {
            log::warn!(
                "Sample period {} s does not match the stream scan period {} s",
                self.config.conversion.sample_period,
                scan_period
            );
        }
        Ok(())
    }

    /// Run one trigger-to-trigger session and emit it to the sink.
    pub fn run_session(&mut self) -> Result<SessionOutcome, AcquisitionError> {
        let index = self.sessions_completed + 1;
        let span = tracing::info_span!("session", index);
        let _entered = span.enter();

        #[cfg(feature = "cpu-profiling")]
        let _zone = tracy_client::span!("session");

        log::info!("Waiting for start trigger.");
        let interrupt = self.interrupt.clone();
        match wait_for_start(
            &mut self.trigger,
            &mut self.device,
            &self.config.poll,
            interrupt.as_deref(),
        )? {
            WaitOutcome::Asserted { .. } => {}
            WaitOutcome::Interrupted => return Err(AcquisitionError::Interrupted),
        }

        log::info!("Starting stream...");
        let mut session = AcquisitionSession::start(self.config.stream.packets_per_request());
        let mut stream = self.device.stream_packets()?;
        let mut stopped_at = None;

        loop {
            if interrupt.as_deref().is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Err(AcquisitionError::Interrupted);
            }
            let Some(item) = stream.next() else {
                break;
            };
            let Some(packet) = item? else {
                // Reads time out after about a second when the stream is slower than that.
                log::info!("No data");
                continue;
            };

            session.absorb(packet);

            if self.trigger.is_stop_asserted(stream.device())? {
                stopped_at = Some(Instant::now());
                break;
            }
        }
        stream.stop()?;
        log::info!("Stop triggered.");

        let completed = session.finish_at(stopped_at.unwrap_or_else(Instant::now));
        log::info!(
            "Length of sampling time: {:.3} seconds.",
            completed.elapsed().as_secs_f64()
        );
        log::info!("Number of samples: {}", completed.len());
        if completed.errors() + completed.underflows() + completed.missed_samples() > 0 {
            log::warn!(
                "Session {} had {} error(s), {} underflow(s), {} missed sample(s)",
                index,
                completed.errors(),
                completed.underflows(),
                completed.missed_samples()
            );
        }

        if completed.is_empty() {
            log::warn!("Stop trigger arrived before any sample, discarding session");
            return Ok(SessionOutcome::Discarded(completed));
        }

        let converted = ConvertedSession::from_session(index, &completed, &self.config.conversion);
        self.sink.persist(&converted)?;
        self.sink.visualize(&converted)?;
        self.sessions_completed = index;

        Ok(SessionOutcome::Completed(completed))
    }

    /// Run sessions until the first fatal error, then reset and close the device.
    pub fn run_forever(mut self) -> FatalShutdown {
        let cause = match self.prepare() {
            Err(e) => e,
            Ok(()) => loop {
                if let Err(e) = self.run_session() {
                    break e;
                }
            },
        };
        self.shutdown(cause)
    }

    fn shutdown(mut self, cause: AcquisitionError) -> FatalShutdown {
        log::error!("Exiting acquisition: {}", cause);

        if let Err(e) = self.device.hard_reset() {
            log::error!("Hard reset failed: {}", e);
        }
        if let Err(e) = self.device.close() {
            log::error!("Closing the device failed: {}", e);
        }

        FatalShutdown {
            cause,
            sessions_completed: self.sessions_completed,
        }
    }
}

/// Acquire sessions forever. Only returns after a fatal error, by which time
/// the device has been hard-reset and closed.
pub fn run_forever<D, T, S>(device: D, trigger: T, sink: S, config: AcquisitionConfig) -> FatalShutdown
where
    D: DaqDevice,
    T: TriggerReader<D>,
    S: SessionSink,
{
    AcquisitionLoop::new(device, trigger, sink, config).run_forever()
}
