use std::time::Duration;

/// Frequency of the device's internal stream clock that `scan_interval` counts in.
pub const STREAM_CLOCK_HZ: u64 = 4_000_000;

const MAX_SAMPLES_PER_PACKET: u8 = 25;
const MAX_RESOLUTION_INDEX: u8 = 8;
const MAX_SETTLING_FACTOR: u8 = 9;
const MAX_PACKETS_PER_REQUEST: u32 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamConfigError {
    #[error("Only single channel streaming is supported, got {0} channels")]
    UnsupportedChannelCount(usize),

    #[error("Expected {expected} channel options, got {actual}")]
    ChannelOptionsMismatch { expected: usize, actual: usize },

    #[error("Samples per packet must be between 1 and 25, got {0}")]
    SamplesPerPacketOutOfRange(u8),

    #[error("Resolution index must be at most 8, got {0}")]
    ResolutionIndexOutOfRange(u8),

    #[error("Settling factor must be at most 9, got {0}")]
    SettlingFactorOutOfRange(u8),

    #[error("Scan interval must be non-zero")]
    ZeroScanInterval,

    #[error("Packets per request must be between 1 and 1000, got {0}")]
    PacketsPerRequestOutOfRange(u32),
}

/// Stream setup handed to the device before acquisition starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    resolution_index: u8,
    samples_per_packet: u8,
    settling_factor: u8,
    channel_numbers: Vec<u8>,
    channel_options: Vec<u8>,
    scan_interval: u16,
    packets_per_request: u32,
}

impl StreamConfig {
    pub fn builder() -> StreamConfigBuilder {
        StreamConfigBuilder::new()
    }

    /// Always 1: the laser sensor is wired to a single analog input.
    pub fn num_channels(&self) -> usize {
        self.channel_numbers.len()
    }

    pub fn resolution_index(&self) -> u8 {
        self.resolution_index
    }

    pub fn samples_per_packet(&self) -> u8 {
        self.samples_per_packet
    }

    pub fn settling_factor(&self) -> u8 {
        self.settling_factor
    }

    pub fn channel_numbers(&self) -> &[u8] {
        &self.channel_numbers
    }

    pub fn channel_options(&self) -> &[u8] {
        &self.channel_options
    }

    pub fn scan_interval(&self) -> u16 {
        self.scan_interval
    }

    /// Packet count every stream read is expected to carry; anything else is an underflow.
    pub fn packets_per_request(&self) -> u32 {
        self.packets_per_request
    }

    /// Time between two scans of the channel list.
    pub fn scan_period(&self) -> Duration {
        Duration::from_nanos(u64::from(self.scan_interval) * 1_000_000_000 / STREAM_CLOCK_HZ)
    }

    /// Number of readings a complete (non-underflowing) read delivers per channel.
    pub fn readings_per_request(&self) -> usize {
        self.packets_per_request as usize * usize::from(self.samples_per_packet)
            / self.num_channels()
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            resolution_index: 1,
            samples_per_packet: MAX_SAMPLES_PER_PACKET,
            settling_factor: 0,
            channel_numbers: vec![0],
            channel_options: vec![0],
            scan_interval: 60_000,
            packets_per_request: 48,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StreamConfigBuilder {
    config: StreamConfig,
}

impl StreamConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: StreamConfig::default(),
        }
    }

    pub fn resolution_index(mut self, index: u8) -> Self {
        self.config.resolution_index = index;
        self
    }

    pub fn samples_per_packet(mut self, samples: u8) -> Self {
        self.config.samples_per_packet = samples;
        self
    }

    pub fn settling_factor(mut self, factor: u8) -> Self {
        self.config.settling_factor = factor;
        self
    }

    /// Select the analog input and its channel option byte.
    pub fn channel(mut self, number: u8, options: u8) -> Self {
        self.config.channel_numbers = vec![number];
        self.config.channel_options = vec![options];
        self
    }

    pub fn channels(mut self, numbers: Vec<u8>, options: Vec<u8>) -> Self {
        self.config.channel_numbers = numbers;
        self.config.channel_options = options;
        self
    }

    pub fn scan_interval(mut self, ticks: u16) -> Self {
        self.config.scan_interval = ticks;
        self
    }

    pub fn packets_per_request(mut self, packets: u32) -> Self {
        self.config.packets_per_request = packets;
        self
    }

    pub fn build(self) -> Result<StreamConfig, StreamConfigError> {
        let config = self.config;

        if config.channel_numbers.len() != 1 {
            return Err(StreamConfigError::UnsupportedChannelCount(
                config.channel_numbers.len(),
            ));
        }
        if config.channel_options.len() != config.channel_numbers.len() {
            return Err(StreamConfigError::ChannelOptionsMismatch {
                expected: config.channel_numbers.len(),
                actual: config.channel_options.len(),
            });
        }
        if !(1..=MAX_SAMPLES_PER_PACKET).contains(&config.samples_per_packet) {
            return Err(StreamConfigError::SamplesPerPacketOutOfRange(
                config.samples_per_packet,
            ));
        }
        if config.resolution_index > MAX_RESOLUTION_INDEX {
            return Err(StreamConfigError::ResolutionIndexOutOfRange(
                config.resolution_index,
            ));
        }
        if config.settling_factor > MAX_SETTLING_FACTOR {
            return Err(StreamConfigError::SettlingFactorOutOfRange(
                config.settling_factor,
            ));
        }
        if config.scan_interval == 0 {
            return Err(StreamConfigError::ZeroScanInterval);
        }
        if !(1..=MAX_PACKETS_PER_REQUEST).contains(&config.packets_per_request) {
            return Err(StreamConfigError::PacketsPerRequestOutOfRange(
                config.packets_per_request,
            ));
        }

        Ok(config)
    }
}

impl Default for StreamConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_hopper_setup() {
        let config = StreamConfig::builder().build().unwrap();
        assert_eq!(config.num_channels(), 1);
        assert_eq!(config.resolution_index(), 1);
        assert_eq!(config.samples_per_packet(), 25);
        assert_eq!(config.settling_factor(), 0);
        assert_eq!(config.channel_numbers(), &[0]);
        assert_eq!(config.channel_options(), &[0]);
        assert_eq!(config.scan_interval(), 60_000);
    }

    #[test]
    fn test_scan_period() {
        let config = StreamConfig::default();
        assert_eq!(config.scan_period(), Duration::from_millis(15));

        let fast = StreamConfig::builder().scan_interval(4_000).build().unwrap();
        assert_eq!(fast.scan_period(), Duration::from_millis(1));
    }

    #[test]
    fn test_readings_per_request() {
        let config = StreamConfig::builder()
            .samples_per_packet(25)
            .packets_per_request(2)
            .build()
            .unwrap();
        assert_eq!(config.readings_per_request(), 50);
    }

    #[test]
    fn test_rejects_multiple_channels() {
        let result = StreamConfig::builder()
            .channels(vec![0, 1], vec![0, 0])
            .build();
        assert_eq!(result, Err(StreamConfigError::UnsupportedChannelCount(2)));
    }

    #[test]
    fn test_rejects_mismatched_options() {
        let result = StreamConfig::builder().channels(vec![0], vec![]).build();
        assert_eq!(
            result,
            Err(StreamConfigError::ChannelOptionsMismatch {
                expected: 1,
                actual: 0
            })
        );
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert!(matches!(
            StreamConfig::builder().samples_per_packet(0).build(),
            Err(StreamConfigError::SamplesPerPacketOutOfRange(0))
        ));
        assert!(matches!(
            StreamConfig::builder().samples_per_packet(26).build(),
            Err(StreamConfigError::SamplesPerPacketOutOfRange(26))
        ));
        assert!(matches!(
            StreamConfig::builder().resolution_index(9).build(),
            Err(StreamConfigError::ResolutionIndexOutOfRange(9))
        ));
        assert!(matches!(
            StreamConfig::builder().settling_factor(10).build(),
            Err(StreamConfigError::SettlingFactorOutOfRange(10))
        ));
        assert!(matches!(
            StreamConfig::builder().scan_interval(0).build(),
            Err(StreamConfigError::ZeroScanInterval)
        ));
        assert!(matches!(
            StreamConfig::builder().packets_per_request(0).build(),
            Err(StreamConfigError::PacketsPerRequestOutOfRange(0))
        ));
        assert!(matches!(
            StreamConfig::builder().packets_per_request(1_001).build(),
            Err(StreamConfigError::PacketsPerRequestOutOfRange(1_001))
        ));
        assert!(StreamConfig::builder().packets_per_request(1_000).build().is_ok());
    }
}
