use polars::prelude::*;

use crate::session::CompletedSession;

pub const TIME_COLUMN_NAME: &str = "time (sec)";
pub const DISTANCE_COLUMN_NAME: &str = "distance (in)";

/// Linear calibration of the laser distance sensor plus the stream time base.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConversionConfig {
    /// Inches per volt.
    pub volts_to_inches: f64,
    /// Sensor output at zero distance, in volts.
    pub volts_at_zero: f64,
    /// Seconds between two samples.
    pub sample_period: f64,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            volts_to_inches: 38.08,
            volts_at_zero: 0.123,
            sample_period: 0.015,
        }
    }
}

impl ConversionConfig {
    pub fn distance(&self, voltage: f64) -> f64 {
        (voltage - self.volts_at_zero) * self.volts_to_inches
    }

    pub fn time(&self, index: usize) -> f64 {
        index as f64 * self.sample_period
    }

    pub fn voltage(&self, distance: f64) -> f64 {
        distance / self.volts_to_inches + self.volts_at_zero
    }

    pub fn convert(&self, voltages: &[f64]) -> Vec<ConvertedSample> {
        #[cfg(feature = "cpu-profiling")]
        let _zone = tracy_client::span!("convert");

        voltages
            .iter()
            .enumerate()
            .map(|(index, &voltage)| ConvertedSample {
                time: self.time(index),
                distance: self.distance(voltage),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvertedSample {
    pub time: f64,
    pub distance: f64,
}

/// Distance trace of one completed session.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedSession {
    pub index: u64,
    pub samples: Vec<ConvertedSample>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl ConvertedSession {
    pub fn from_session(index: u64, session: &CompletedSession, config: &ConversionConfig) -> Self {
        Self {
            index,
            samples: config.convert(session.samples()),
        }
    }

    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.time).collect()
    }

    pub fn distances(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.distance).collect()
    }

    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        df!(
            TIME_COLUMN_NAME => self.times(),
            DISTANCE_COLUMN_NAME => self.distances()
        )
    }

    /// Min, max and mean distance, `None` for an empty trace.
    pub fn summary(&self) -> PolarsResult<Option<DistanceSummary>> {
        if self.samples.is_empty() {
            return Ok(None);
        }

        let stats = self
            .to_dataframe()?
            .lazy()
            .select([
                col(DISTANCE_COLUMN_NAME).min().alias("min"),
                col(DISTANCE_COLUMN_NAME).max().alias("max"),
                col(DISTANCE_COLUMN_NAME).mean().alias("mean"),
            ])
            .collect()?;

        let value = |name: &str| -> PolarsResult<Option<f64>> {
            Ok(stats.column(name)?.f64()?.get(0))
        };

        Ok(match (value("min")?, value("max")?, value("mean")?) {
            (Some(min), Some(max), Some(mean)) => Some(DistanceSummary { min, max, mean }),
            _ => None,
        })
    }
}
