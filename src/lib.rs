//! # Bun Hopper DAQ
//!
//! Triggered streaming acquisition for the bun hopper laser distance sensor.
//!
//! A digital input gates each acquisition session: while the line is asserted
//! the DAQ device streams analog readings, which are accumulated together with
//! error, underflow and missed-sample counters. When the line drops the stream
//! is stopped, the voltages are converted to inches and the session is written
//! to CSV and plotted. Then the loop arms the trigger again.
//!
//! ## Features
//!
//! - **Device agnostic**: the loop talks to a [`DaqDevice`] trait; a
//!   [`SimulatedDevice`] is included for running without hardware
//! - **Fault accounting**: timeouts, device error codes, underflows and missed
//!   samples are logged and counted without stopping the session
//! - **One fatal path**: any [`AcquisitionError`] resets and closes the device
//!   exactly once and hands back a [`FatalShutdown`]
//! - **DataFrame output**: uses `polars` for CSV output and summaries
//! - **Plot window**: blocking distance/time plot (`plot-window` feature)
//!
//! ## Examples
//!
//! ### Converting a session
//!
//! ```rust
//! use bunhopper_daq::ConversionConfig;
//!
//! let conversion = ConversionConfig::default();
//! let samples = conversion.convert(&[0.123, 0.5]);
//!
//! assert_eq!(samples[0].time, 0.0);
//! assert_eq!(samples[0].distance, 0.0);
//! assert_eq!(samples[1].time, 0.015);
//! ```
//!
//! ### Running against the simulator
//!
//! ```rust,no_run
//! use bunhopper_daq::{
//!     run_forever, AcquisitionConfig, CsvPlotSink, DigitalTrigger, OutputFile,
//!     SimulatedDevice, SimulatorConfig,
//! };
//!
//! let config = AcquisitionConfig::default();
//! let device = SimulatedDevice::new(SimulatorConfig::default(), config.conversion);
//! let sink = CsvPlotSink::new(OutputFile::default(), true);
//!
//! // Only comes back once something went wrong.
//! let shutdown = run_forever(device, DigitalTrigger::default(), sink, config);
//! eprintln!("{}", shutdown);
//! ```

pub mod controller;
pub mod conversion;
pub mod device;
#[cfg(feature = "plot-window")]
pub mod plot;
pub mod session;
pub mod simulator;
pub mod sink;
pub mod stream_config;
pub mod trigger;

#[cfg(test)]
mod testing;

// Re-export the main types for convenience
pub use controller::{
    run_forever, AcquisitionConfig, AcquisitionError, AcquisitionLoop, FatalShutdown,
    SessionOutcome,
};

pub use conversion::{ConversionConfig, ConvertedSample, ConvertedSession, DistanceSummary};

pub use device::{ActiveStream, DaqDevice, DataPacket, DeviceError};

pub use session::{AcquisitionSession, CompletedSession};

pub use simulator::{SimulatedDevice, SimulatorConfig};

pub use sink::{CsvPlotSink, OutputFile, OutputNaming, SessionSink, SinkError};

pub use stream_config::{StreamConfig, StreamConfigBuilder, StreamConfigError};

pub use trigger::{BitState, DigitalTrigger, PollPolicy, TriggerReader};
