//! Scripted collaborators shared by the unit tests.

use std::collections::VecDeque;

use crate::conversion::ConvertedSession;
use crate::device::{DaqDevice, DataPacket, DeviceError};
use crate::sink::{SessionSink, SinkError};
use crate::stream_config::StreamConfig;
use crate::trigger::TriggerReader;

pub enum Step {
    Packet(DataPacket),
    Timeout,
    Fail,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Calls {
    pub calibrations: usize,
    pub configures: usize,
    pub input_setups: usize,
    pub starts: usize,
    pub stops: usize,
    pub resets: usize,
    pub closes: usize,
}

/// Device replaying a fixed list of stream reads. Once the script runs out
/// every read fails as a lost link.
pub struct ScriptedDevice {
    steps: VecDeque<Step>,
    inputs: VecDeque<bool>,
    pub calls: Calls,
    pub fail_configure: bool,
}

impl ScriptedDevice {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
            inputs: VecDeque::new(),
            calls: Calls::default(),
            fail_configure: false,
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<bool>) -> Self {
        self.inputs = inputs.into();
        self
    }
}

impl DaqDevice for ScriptedDevice {
    fn set_calibration(&mut self) -> Result<(), DeviceError> {
        self.calls.calibrations += 1;
        Ok(())
    }

    fn configure_stream(&mut self, _config: &StreamConfig) -> Result<(), DeviceError> {
        self.calls.configures += 1;
        if self.fail_configure {
            return Err(DeviceError::NotConfigured);
        }
        Ok(())
    }

    fn configure_digital_inputs(&mut self) -> Result<(), DeviceError> {
        self.calls.input_setups += 1;
        Ok(())
    }

    fn read_digital_input(&mut self, port: u8, bit: u8) -> Result<bool, DeviceError> {
        if port != 0 || bit > 7 {
            return Err(DeviceError::InvalidInput { port, bit });
        }
        self.inputs
            .pop_front()
            .ok_or_else(|| DeviceError::Link("input script exhausted".to_string()))
    }

    fn start_stream(&mut self) -> Result<(), DeviceError> {
        self.calls.starts += 1;
        Ok(())
    }

    fn read_packet(&mut self) -> Result<Option<DataPacket>, DeviceError> {
        match self.steps.pop_front() {
            Some(Step::Packet(packet)) => Ok(Some(packet)),
            Some(Step::Timeout) => Ok(None),
            Some(Step::Fail) | None => Err(DeviceError::Link("stream script exhausted".to_string())),
        }
    }

    fn stop_stream(&mut self) -> Result<(), DeviceError> {
        self.calls.stops += 1;
        Ok(())
    }

    fn hard_reset(&mut self) -> Result<(), DeviceError> {
        self.calls.resets += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.calls.closes += 1;
        Ok(())
    }
}

/// Trigger answering from two scripts; an exhausted script reads as not asserted.
#[derive(Default)]
pub struct ScriptedTrigger {
    pub start: VecDeque<bool>,
    pub stop: VecDeque<bool>,
    pub start_reads: usize,
    pub stop_reads: usize,
}

impl ScriptedTrigger {
    pub fn new(start: Vec<bool>, stop: Vec<bool>) -> Self {
        Self {
            start: start.into(),
            stop: stop.into(),
            ..Self::default()
        }
    }
}

impl<D: ?Sized> TriggerReader<D> for ScriptedTrigger {
    fn is_start_asserted(&mut self, _io: &mut D) -> Result<bool, DeviceError> {
        self.start_reads += 1;
        Ok(self.start.pop_front().unwrap_or(false))
    }

    fn is_stop_asserted(&mut self, _io: &mut D) -> Result<bool, DeviceError> {
        self.stop_reads += 1;
        Ok(self.stop.pop_front().unwrap_or(false))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub persisted: Vec<ConvertedSession>,
    pub visualized: usize,
    pub fail_persist: bool,
}

impl SessionSink for RecordingSink {
    fn persist(&mut self, session: &ConvertedSession) -> Result<(), SinkError> {
        if self.fail_persist {
            return Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only output",
            )));
        }
        self.persisted.push(session.clone());
        Ok(())
    }

    fn visualize(&mut self, _session: &ConvertedSession) -> Result<(), SinkError> {
        self.visualized += 1;
        Ok(())
    }
}
