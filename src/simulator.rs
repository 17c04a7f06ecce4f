//! Hardware-free stand-in for the U6 and the hopper sensor.
//!
//! The simulator keeps its own clock. Reading the trigger line while idle
//! advances it by `input_read_time`; every stream read advances it by the
//! duration of the samples it returns. A read hands back only the complete
//! USB packets that arrive within `read_timeout`, so slow scan rates show up
//! as short reads. The trigger line (FIO0) is low for `idle_time` and then
//! high for `active_time`, repeating.

use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::conversion::ConversionConfig;
use crate::device::{DaqDevice, DataPacket, DeviceError};
use crate::stream_config::StreamConfig;

const TRIGGER_PORT: u8 = 0;
const TRIGGER_BIT: u8 = 0;
const MAX_PORT: u8 = 2;
const MAX_BIT: u8 = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    pub idle_time: Duration,
    pub active_time: Duration,
    /// Simulated time consumed by one digital input read.
    pub input_read_time: Duration,
    /// Peak amplitude of the uniform noise added to every reading.
    pub noise_volts: f64,
    /// Longest a stream read blocks before returning what has arrived.
    pub read_timeout: Duration,
    /// Every n-th stream read times out without data.
    pub timeout_every: Option<u64>,
    /// Sleep for the simulated duration of each read.
    pub realtime: bool,
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            idle_time: Duration::from_secs(2),
            active_time: Duration::from_secs(10),
            input_read_time: Duration::from_millis(1),
            noise_volts: 0.002,
            read_timeout: Duration::from_secs(1),
            timeout_every: None,
            realtime: true,
            seed: 0x00B0_B0B0,
        }
    }
}

pub struct SimulatedDevice {
    config: SimulatorConfig,
    sensor: ConversionConfig,
    stream: Option<StreamConfig>,
    calibrated: bool,
    inputs_configured: bool,
    streaming: bool,
    closed: bool,
    clock: Duration,
    reads: u64,
    sample_index: u64,
    rng: StdRng,
}

impl SimulatedDevice {
    /// `sensor` is used in reverse to turn the synthetic distance into volts.
    pub fn new(config: SimulatorConfig, sensor: ConversionConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            sensor,
            stream: None,
            calibrated: false,
            inputs_configured: false,
            streaming: false,
            closed: false,
            clock: Duration::ZERO,
            reads: 0,
            sample_index: 0,
            rng,
        }
    }

    pub fn clock(&self) -> Duration {
        self.clock
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<(), DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        Ok(())
    }

    fn advance(&mut self, elapsed: Duration) {
        self.clock += elapsed;
        if self.config.realtime {
            thread::sleep(elapsed);
        }
    }

    fn trigger_level(&self) -> bool {
        let cycle = (self.config.idle_time + self.config.active_time).as_secs_f64();
        if cycle <= 0.0 {
            return false;
        }
        self.clock.as_secs_f64() % cycle >= self.config.idle_time.as_secs_f64()
    }

    /// Bun stack distance: buns are dispensed in 6 second cycles, the gap
    /// growing from 2 in to 9.2 in before the hopper is refilled.
    fn hopper_distance(time: f64) -> f64 {
        2.0 + (time % 6.0) * 1.2
    }

    fn next_reading(&mut self, period: f64) -> f64 {
        let time = self.sample_index as f64 * period;
        self.sample_index += 1;

        let noise = if self.config.noise_volts > 0.0 {
            self.rng
                .gen_range(-self.config.noise_volts..=self.config.noise_volts)
        } else {
            0.0
        };
        self.sensor.voltage(Self::hopper_distance(time)) + noise
    }
}

impl DaqDevice for SimulatedDevice {
    fn set_calibration(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        log::debug!("Simulator: loading calibration constants");
        self.calibrated = true;
        Ok(())
    }

    fn configure_stream(&mut self, config: &StreamConfig) -> Result<(), DeviceError> {
        self.ensure_open()?;
        if self.streaming {
            return Err(DeviceError::AlreadyStreaming);
        }
        if !self.calibrated {
            log::warn!("Simulator: stream configured before calibration was loaded");
        }
        log::debug!(
            "Simulator: {} channel(s), {} samples/packet, scan interval {}",
            config.num_channels(),
            config.samples_per_packet(),
            config.scan_interval()
        );
        self.stream = Some(config.clone());
        Ok(())
    }

    fn configure_digital_inputs(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        self.inputs_configured = true;
        Ok(())
    }

    fn read_digital_input(&mut self, port: u8, bit: u8) -> Result<bool, DeviceError> {
        self.ensure_open()?;
        if port > MAX_PORT || bit > MAX_BIT {
            return Err(DeviceError::InvalidInput { port, bit });
        }
        if !self.streaming {
            self.clock += self.config.input_read_time;
        }
        if !self.inputs_configured || (port, bit) != (TRIGGER_PORT, TRIGGER_BIT) {
            return Ok(false);
        }
        Ok(self.trigger_level())
    }

    fn start_stream(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        if self.stream.is_none() {
            return Err(DeviceError::NotConfigured);
        }
        if self.streaming {
            return Err(DeviceError::AlreadyStreaming);
        }
        self.streaming = true;
        self.sample_index = 0;
        Ok(())
    }

    fn read_packet(&mut self) -> Result<Option<DataPacket>, DeviceError> {
        self.ensure_open()?;
        if !self.streaming {
            return Err(DeviceError::NotStreaming);
        }
        let stream = self.stream.clone().ok_or(DeviceError::NotConfigured)?;

        self.reads += 1;
        if self
            .config
            .timeout_every
            .is_some_and(|every| every > 0 && self.reads % every == 0)
        {
            return Ok(None);
        }

        let period = stream.scan_period();
        let per_packet = usize::from(stream.samples_per_packet()) / stream.num_channels();
        let packet_time = period * per_packet as u32;
        let requested = stream.packets_per_request();
        let delivered = if packet_time.is_zero() {
            requested
        } else {
            (self.config.read_timeout.as_nanos() / packet_time.as_nanos())
                .min(u128::from(requested)) as u32
        };

        if delivered == 0 {
            self.advance(self.config.read_timeout);
            return Ok(None);
        }

        let readings = (0..per_packet * delivered as usize)
            .map(|_| self.next_reading(period.as_secs_f64()))
            .collect();
        self.advance(packet_time * delivered);

        Ok(Some(DataPacket::new(delivered, readings)))
    }

    fn stop_stream(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        if !self.streaming {
            return Err(DeviceError::NotStreaming);
        }
        self.streaming = false;
        Ok(())
    }

    fn hard_reset(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        log::debug!("Simulator: hard reset");
        self.streaming = false;
        self.stream = None;
        self.calibrated = false;
        self.inputs_configured = false;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> SimulatorConfig {
        SimulatorConfig {
            idle_time: Duration::from_millis(10),
            active_time: Duration::from_secs(1),
            input_read_time: Duration::from_millis(1),
            noise_volts: 0.0,
            read_timeout: Duration::from_secs(1),
            timeout_every: None,
            realtime: false,
            seed: 1,
        }
    }

    fn configured(config: SimulatorConfig) -> SimulatedDevice {
        let mut device = SimulatedDevice::new(config, ConversionConfig::default());
        device.set_calibration().unwrap();
        device.configure_digital_inputs().unwrap();
        device
            .configure_stream(
                &StreamConfig::builder()
                    .packets_per_request(1)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        device
    }

    #[test]
    fn test_trigger_rises_after_idle_time() {
        let mut device = configured(quiet());
        let levels: Vec<bool> = (0..12)
            .map(|_| device.read_digital_input(0, 0).unwrap())
            .collect();

        assert!(levels[..9].iter().all(|level| !level));
        assert!(levels[9..].iter().all(|level| *level));
    }

    #[test]
    fn test_unused_lines_read_low() {
        let mut device = configured(quiet());
        for _ in 0..20 {
            device.read_digital_input(0, 0).unwrap();
        }
        assert!(!device.read_digital_input(1, 3).unwrap());
        assert!(matches!(
            device.read_digital_input(3, 0),
            Err(DeviceError::InvalidInput { port: 3, bit: 0 })
        ));
    }

    #[test]
    fn test_packets_follow_stream_config() {
        let mut device = configured(quiet());
        device.start_stream().unwrap();

        let packet = device.read_packet().unwrap().unwrap();
        assert_eq!(packet.packet_count, 1);
        assert_eq!(packet.readings.len(), 25);
        assert_eq!(packet.error_code, 0);

        // First reading is the 2 in gap at t = 0.
        let sensor = ConversionConfig::default();
        assert!((sensor.distance(packet.readings[0]) - 2.0).abs() < 1e-9);
        assert_eq!(device.clock(), Duration::from_millis(375));
    }

    #[test]
    fn test_read_is_cut_short_by_timeout() {
        let mut device = SimulatedDevice::new(
            SimulatorConfig {
                realtime: false,
                ..SimulatorConfig::default()
            },
            ConversionConfig::default(),
        );
        device.set_calibration().unwrap();
        device.configure_stream(&StreamConfig::default()).unwrap();
        device.start_stream().unwrap();

        // 375 ms per 25 sample packet, so only two of the 48 packets fit in a second.
        let packet = device.read_packet().unwrap().unwrap();
        assert_eq!(packet.packet_count, 2);
        assert_eq!(packet.readings.len(), 50);
        assert_eq!(device.clock(), Duration::from_millis(750));
    }

    #[test]
    fn test_read_without_a_complete_packet_times_out() {
        let mut device = configured(SimulatorConfig {
            read_timeout: Duration::from_millis(100),
            ..quiet()
        });
        device.start_stream().unwrap();

        assert!(device.read_packet().unwrap().is_none());
        assert_eq!(device.clock(), Duration::from_millis(100));
    }

    #[test]
    fn test_periodic_timeouts() {
        let mut device = configured(SimulatorConfig {
            timeout_every: Some(2),
            ..quiet()
        });
        device.start_stream().unwrap();

        assert!(device.read_packet().unwrap().is_some());
        assert!(device.read_packet().unwrap().is_none());
        assert!(device.read_packet().unwrap().is_some());
    }

    #[test]
    fn test_lifecycle_errors() {
        let mut device = SimulatedDevice::new(quiet(), ConversionConfig::default());
        assert!(matches!(device.start_stream(), Err(DeviceError::NotConfigured)));
        assert!(matches!(device.read_packet(), Err(DeviceError::NotStreaming)));

        let mut device = configured(quiet());
        device.start_stream().unwrap();
        assert!(matches!(device.start_stream(), Err(DeviceError::AlreadyStreaming)));

        device.hard_reset().unwrap();
        assert!(!device.is_streaming());
        device.close().unwrap();
        assert!(device.is_closed());
        assert!(matches!(device.read_digital_input(0, 0), Err(DeviceError::Closed)));
    }
}
