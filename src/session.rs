use std::time::{Duration, Instant};

use crate::device::DataPacket;

/// A session that is still receiving packets.
#[derive(Debug)]
pub struct AcquisitionSession {
    started_at: Instant,
    expected_packets: u32,
    samples: Vec<f64>,
    missed_samples: u64,
    underflows: u64,
    errors: u64,
}

impl AcquisitionSession {
    pub fn start(expected_packets: u32) -> Self {
        Self::started_at(Instant::now(), expected_packets)
    }

    pub fn started_at(started_at: Instant, expected_packets: u32) -> Self {
        Self {
            started_at,
            expected_packets,
            samples: Vec::new(),
            missed_samples: 0,
            underflows: 0,
            errors: 0,
        }
    }

    /// Fold one packet into the session. Anomalies are logged and counted but
    /// the readings are always kept.
    pub fn absorb(&mut self, packet: DataPacket) {
        if packet.error_code != 0 {
            self.errors += 1;
            log::warn!("Error: {} after {:?}", packet.error_code, self.started_at.elapsed());
        }

        if packet.packet_count != self.expected_packets {
            self.underflows += 1;
            log::warn!(
                "UNDERFLOW: {} packets, expected {}",
                packet.packet_count,
                self.expected_packets
            );
        }

        if packet.missed_samples != 0 {
            self.missed_samples += u64::from(packet.missed_samples);
            log::warn!("MISSED SAMPLES: {}", packet.missed_samples);
        }

        self.samples.extend(packet.readings);
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn finish(self) -> CompletedSession {
        self.finish_at(Instant::now())
    }

    pub fn finish_at(self, stopped_at: Instant) -> CompletedSession {
        CompletedSession {
            started_at: self.started_at,
            stopped_at,
            samples: self.samples,
            missed_samples: self.missed_samples,
            underflows: self.underflows,
            errors: self.errors,
        }
    }
}

/// A finished session. Read-only from here on.
#[derive(Debug, Clone)]
pub struct CompletedSession {
    started_at: Instant,
    stopped_at: Instant,
    samples: Vec<f64>,
    missed_samples: u64,
    underflows: u64,
    errors: u64,
}

impl CompletedSession {
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn stopped_at(&self) -> Instant {
        self.stopped_at
    }

    /// Zero when the stop timestamp is not after the start timestamp.
    pub fn elapsed(&self) -> Duration {
        self.stopped_at.saturating_duration_since(self.started_at)
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Stop was seen before any reading arrived; such a session is a trigger glitch.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn missed_samples(&self) -> u64 {
        self.missed_samples
    }

    pub fn underflows(&self) -> u64 {
        self.underflows
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }
}
