use crate::stream_config::StreamConfig;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Stream was started before the device was configured")]
    NotConfigured,

    #[error("Device is not streaming")]
    NotStreaming,

    #[error("Device is already streaming")]
    AlreadyStreaming,

    #[error("Device has been closed")]
    Closed,

    #[error("No digital input at port {port} bit {bit}")]
    InvalidInput { port: u8, bit: u8 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lost connection to device: {0}")]
    Link(String),
}

/// One block of readings delivered by the device stream.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPacket {
    /// Error code reported by the device, 0 when the read was clean.
    pub error_code: u8,
    /// Number of USB packets that made up this read.
    pub packet_count: u32,
    /// Samples the device dropped before this read.
    pub missed_samples: u32,
    /// Analog readings in volts, oldest first.
    pub readings: Vec<f64>,
}

impl DataPacket {
    pub fn new(packet_count: u32, readings: Vec<f64>) -> Self {
        Self {
            error_code: 0,
            packet_count,
            missed_samples: 0,
            readings,
        }
    }

    pub fn with_error(mut self, code: u8) -> Self {
        self.error_code = code;
        self
    }

    pub fn with_missed(mut self, missed: u32) -> Self {
        self.missed_samples = missed;
        self
    }
}

/// Capabilities the acquisition loop needs from a streaming DAQ device.
pub trait DaqDevice {
    /// Load the factory calibration constants.
    fn set_calibration(&mut self) -> Result<(), DeviceError>;

    fn configure_stream(&mut self, config: &StreamConfig) -> Result<(), DeviceError>;

    /// Switch the digital lines used for triggering to inputs.
    fn configure_digital_inputs(&mut self) -> Result<(), DeviceError>;

    fn read_digital_input(&mut self, port: u8, bit: u8) -> Result<bool, DeviceError>;

    fn start_stream(&mut self) -> Result<(), DeviceError>;

    /// Block until the next read completes. `Ok(None)` means the read timed
    /// out without data, which is not a device failure.
    fn read_packet(&mut self) -> Result<Option<DataPacket>, DeviceError>;

    fn stop_stream(&mut self) -> Result<(), DeviceError>;

    fn hard_reset(&mut self) -> Result<(), DeviceError>;

    fn close(&mut self) -> Result<(), DeviceError>;

    /// Start streaming and hand out the packet sequence.
    fn stream_packets(&mut self) -> Result<ActiveStream<'_, Self>, DeviceError>
    where
        Self: Sized,
    {
        ActiveStream::start(self)
    }
}

impl<D: DaqDevice + ?Sized> DaqDevice for &mut D {
    fn set_calibration(&mut self) -> Result<(), DeviceError> {
        (**self).set_calibration()
    }

    fn configure_stream(&mut self, config: &StreamConfig) -> Result<(), DeviceError> {
        (**self).configure_stream(config)
    }

    fn configure_digital_inputs(&mut self) -> Result<(), DeviceError> {
        (**self).configure_digital_inputs()
    }

    fn read_digital_input(&mut self, port: u8, bit: u8) -> Result<bool, DeviceError> {
        (**self).read_digital_input(port, bit)
    }

    fn start_stream(&mut self) -> Result<(), DeviceError> {
        (**self).start_stream()
    }

    fn read_packet(&mut self) -> Result<Option<DataPacket>, DeviceError> {
        (**self).read_packet()
    }

    fn stop_stream(&mut self) -> Result<(), DeviceError> {
        (**self).stop_stream()
    }

    fn hard_reset(&mut self) -> Result<(), DeviceError> {
        (**self).hard_reset()
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        (**self).close()
    }
}

/// A running stream. Iterating yields reads forever; the sequence only ends
/// when the owner calls [`ActiveStream::stop`].
pub struct ActiveStream<'a, D: DaqDevice> {
    device: &'a mut D,
    reads: u64,
}

impl<'a, D: DaqDevice> ActiveStream<'a, D> {
    pub fn start(device: &'a mut D) -> Result<Self, DeviceError> {
        device.start_stream()?;
        Ok(Self { device, reads: 0 })
    }

    /// Access the device between reads, e.g. to sample the trigger line.
    pub fn device(&mut self) -> &mut D {
        self.device
    }

    /// Number of reads issued so far, timeouts included.
    pub fn reads(&self) -> u64 {
        self.reads
    }

    pub fn stop(self) -> Result<(), DeviceError> {
        log::debug!("Stopping stream after {} reads", self.reads);
        self.device.stop_stream()
    }
}

impl<D: DaqDevice> Iterator for ActiveStream<'_, D> {
    type Item = Result<Option<DataPacket>, DeviceError>;

    fn next(&mut self) -> Option<Self::Item> {
        #[cfg(feature = "cpu-profiling")]
        let _zone = tracy_client::span!("read_packet");

        self.reads += 1;
        Some(self.device.read_packet())
    }
}
