//! Historical seconds-per-message samples and the duration estimate derived from them.
//!
//! Two plain-text files back the tracker:
//! - the sample file, one `f64` per line, appended after every scan;
//! - the average file, a single `f64`, rewritten after every scan.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{self, Config};
use crate::error::{Result, UnsublyError};

/// Append-only timing history with a cached overall average.
#[derive(Debug, Clone)]
pub struct TimingTracker {
    samples_path: PathBuf,
    average_path: PathBuf,
}

impl TimingTracker {
    pub fn new(samples_path: impl Into<PathBuf>, average_path: impl Into<PathBuf>) -> Self {
        Self {
            samples_path: samples_path.into(),
            average_path: average_path.into(),
        }
    }

    /// Tracker using the configured file names inside the data directory.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config::artifact_path(config, &config.output.timing_samples_file),
            config::artifact_path(config, &config.output.average_file),
        )
    }

    /// Record one finished scan and return the new overall average.
    ///
    /// Nothing is recorded when no message was processed.
    pub fn record(&self, elapsed: Duration, processed: usize) -> Result<Option<f64>> {
        if processed == 0 {
            debug!("No messages processed, timing sample skipped");
            return Ok(None);
        }

        let sample = elapsed.as_secs_f64() / processed as f64;
        self.append_sample(sample)?;

        let samples = self.samples()?;
        let average = samples.iter().sum::<f64>() / samples.len() as f64;
        write_file(&self.average_path, &format!("{average}\n"))?;

        info!(
            sample = sample,
            average = average,
            samples = samples.len(),
            "Recorded scan timing"
        );
        Ok(Some(average))
    }

    /// All stored samples. Unparseable lines are skipped.
    pub fn samples(&self) -> Result<Vec<f64>> {
        let contents = match std::fs::read_to_string(&self.samples_path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(UnsublyError::io(&self.samples_path, e)),
        };

        Ok(contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(idx, line)| match line.trim().parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 0.0 => Some(v),
                _ => {
                    warn!(
                        path = %self.samples_path.display(),
                        line = idx + 1,
                        "Ignoring malformed timing sample"
                    );
                    None
                }
            })
            .collect())
    }

    /// Stored average seconds per message, if any scan was recorded.
    pub fn current_average(&self) -> Result<Option<f64>> {
        match std::fs::read_to_string(&self.average_path) {
            Ok(c) => c
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|e| UnsublyError::InvalidArtifact {
                    path: self.average_path.clone(),
                    line: 1,
                    reason: e.to_string(),
                }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(UnsublyError::io(&self.average_path, e)),
        }
    }

    /// Projected duration for a scan of `requested` messages.
    pub fn estimate(&self, requested: usize) -> Result<Option<Duration>> {
        Ok(self
            .current_average()?
            .map(|avg| Duration::from_secs_f64((avg * requested as f64).max(0.0))))
    }

    fn append_sample(&self, sample: f64) -> Result<()> {
        ensure_parent(&self.samples_path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.samples_path)
            .map_err(|e| UnsublyError::io(&self.samples_path, e))?;
        writeln!(file, "{sample}").map_err(|e| UnsublyError::io(&self.samples_path, e))
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| UnsublyError::io(parent, e))?;
        }
    }
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    ensure_parent(path)?;
    std::fs::write(path, contents).map_err(|e| UnsublyError::io(path, e))
}
