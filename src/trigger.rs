use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::device::{DaqDevice, DeviceError};

/// Reads the start/stop condition that gates a session.
///
/// The reader is handed the device on every call instead of owning it, so the
/// same device can keep streaming while the trigger line is sampled.
pub trait TriggerReader<D: ?Sized> {
    fn is_start_asserted(&mut self, io: &mut D) -> Result<bool, DeviceError>;

    /// Stop is the logical inverse of start unless a reader says otherwise.
    fn is_stop_asserted(&mut self, io: &mut D) -> Result<bool, DeviceError> {
        Ok(!self.is_start_asserted(io)?)
    }
}

impl<D: ?Sized, T: TriggerReader<D> + ?Sized> TriggerReader<D> for &mut T {
    fn is_start_asserted(&mut self, io: &mut D) -> Result<bool, DeviceError> {
        (**self).is_start_asserted(io)
    }

    fn is_stop_asserted(&mut self, io: &mut D) -> Result<bool, DeviceError> {
        (**self).is_stop_asserted(io)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitState {
    High,
    Low,
}

/// A single digital input line used as a level trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitalTrigger {
    pub port: u8,
    pub bit: u8,
    pub active: BitState,
}

impl DigitalTrigger {
    pub fn new(port: u8, bit: u8, active: BitState) -> Self {
        Self { port, bit, active }
    }

    pub fn start_streaming_when() -> BitTriggerBuilder {
        BitTriggerBuilder::new()
    }
}

impl Default for DigitalTrigger {
    /// FIO0 pulled high starts a session.
    fn default() -> Self {
        Self::new(0, 0, BitState::High)
    }
}

impl<D: DaqDevice + ?Sized> TriggerReader<D> for DigitalTrigger {
    fn is_start_asserted(&mut self, io: &mut D) -> Result<bool, DeviceError> {
        let level = io.read_digital_input(self.port, self.bit)?;
        Ok(match self.active {
            BitState::High => level,
            BitState::Low => !level,
        })
    }
}

#[derive(Debug)]
pub struct BitTriggerBuilder {
    port: u8,
}

impl BitTriggerBuilder {
    pub fn new() -> Self {
        Self { port: 0 }
    }

    pub fn port(mut self, port: u8) -> Self {
        self.port = port;
        self
    }

    pub fn bit_is(self, bit: u8, state: BitState) -> DigitalTrigger {
        DigitalTrigger::new(self.port, bit, state)
    }

    pub fn bit0_is(self, state: BitState) -> DigitalTrigger {
        self.bit_is(0, state)
    }
}

impl Default for BitTriggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// How the start trigger is polled while idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between two reads of the trigger line.
    pub interval: Duration,
    /// Consecutive asserted reads required before the start counts.
    pub debounce_reads: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1),
            debounce_reads: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Asserted { polls: u64 },
    Interrupted,
}

/// Block until the start condition holds for `debounce_reads` reads in a row.
pub fn wait_for_start<D, T>(
    trigger: &mut T,
    io: &mut D,
    policy: &PollPolicy,
    interrupt: Option<&AtomicBool>,
) -> Result<WaitOutcome, DeviceError>
where
    D: ?Sized,
    T: TriggerReader<D> + ?Sized,
{
    let required = policy.debounce_reads.max(1);
    let mut consecutive = 0u32;
    let mut polls = 0u64;

    loop {
        if interrupt.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Ok(WaitOutcome::Interrupted);
        }

        polls += 1;
        if trigger.is_start_asserted(io)? {
            consecutive += 1;
            if consecutive >= required {
                log::debug!("Start trigger asserted after {} polls", polls);
                return Ok(WaitOutcome::Asserted { polls });
            }
        } else {
            consecutive = 0;
        }

        if !policy.interval.is_zero() {
            thread::sleep(policy.interval);
        }
    }
}
