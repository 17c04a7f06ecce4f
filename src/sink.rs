use std::fs::File;
use std::path::{Path, PathBuf};

use polars::prelude::*;

use crate::conversion::ConvertedSession;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to build or write the data frame: {0}")]
    Polars(#[from] PolarsError),

    #[error("Plot window failed: {0}")]
    Plot(String),
}

/// Receives every converted session, first for storage and then for display.
pub trait SessionSink {
    fn persist(&mut self, session: &ConvertedSession) -> Result<(), SinkError>;

    fn visualize(&mut self, session: &ConvertedSession) -> Result<(), SinkError>;
}

impl<S: SessionSink + ?Sized> SessionSink for &mut S {
    fn persist(&mut self, session: &ConvertedSession) -> Result<(), SinkError> {
        (**self).persist(session)
    }

    fn visualize(&mut self, session: &ConvertedSession) -> Result<(), SinkError> {
        (**self).visualize(session)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputNaming {
    /// Every session rewrites the same file.
    Overwrite,
    /// Each session gets `<stem>_<NNNN>[.<ext>]`.
    Numbered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    path: PathBuf,
    naming: OutputNaming,
}

impl OutputFile {
    pub fn new(path: impl Into<PathBuf>, naming: OutputNaming) -> Self {
        Self {
            path: path.into(),
            naming,
        }
    }

    pub fn path_for(&self, session_index: u64) -> PathBuf {
        match self.naming {
            OutputNaming::Overwrite => self.path.clone(),
            OutputNaming::Numbered => {
                let stem = self
                    .path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let name = match self.path.extension() {
                    Some(ext) => format!("{}_{:04}.{}", stem, session_index, ext.to_string_lossy()),
                    None => format!("{}_{:04}", stem, session_index),
                };
                self.path.with_file_name(name)
            }
        }
    }
}

impl Default for OutputFile {
    fn default() -> Self {
        Self::new("test", OutputNaming::Overwrite)
    }
}

/// Write `time (sec),distance (in)` rows for a session.
pub fn write_csv(session: &ConvertedSession, path: &Path) -> Result<(), SinkError> {
    #[cfg(feature = "cpu-profiling")]
    let _zone = tracy_client::span!("write_csv");

    let mut df = session.to_dataframe()?;
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;
    Ok(())
}

/// Writes each session to CSV and shows it in a blocking plot window.
#[derive(Debug, Clone)]
pub struct CsvPlotSink {
    output: OutputFile,
    show_plot: bool,
}

impl CsvPlotSink {
    pub fn new(output: OutputFile, show_plot: bool) -> Self {
        Self { output, show_plot }
    }

    pub fn output(&self) -> &OutputFile {
        &self.output
    }
}

impl SessionSink for CsvPlotSink {
    fn persist(&mut self, session: &ConvertedSession) -> Result<(), SinkError> {
        let path = self.output.path_for(session.index);
        write_csv(session, &path)?;
        log::info!(
            "Wrote {} samples to {}",
            session.samples.len(),
            path.display()
        );
        Ok(())
    }

    fn visualize(&mut self, session: &ConvertedSession) -> Result<(), SinkError> {
        if let Some(summary) = session.summary()? {
            log::info!(
                "Distance range: {:.3} in to {:.3} in (mean: {:.3} in)",
                summary.min,
                summary.max,
                summary.mean
            );
        }

        #[cfg(feature = "plot-window")]
        if self.show_plot {
            return crate::plot::show_blocking(session);
        }

        #[cfg(not(feature = "plot-window"))]
        if self.show_plot {
            log::debug!("Built without the plot window, skipping plot");
        }

        Ok(())
    }
}
