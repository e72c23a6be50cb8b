//! Per-run directory layout
//!
//! [`RunLayout`] binds a shared [`ProjectPaths`] to one training run and
//! hands out its checkpoint and log locations. Both directories are
//! resolved on first access and the stored value is returned afterwards,
//! so a datestamp computed at startup stays fixed for the life of the run.
//!
//! With a producer set, every checkpoint path handed out is recorded in the
//! project's producer ledger.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::error::{Result, TemplateError};
use crate::normalize::ensure_extension;
use crate::placeholder::substitute;
use crate::project::{validate_run, ProjectPaths};

/// Checkpoint filename used when none is configured
pub const DEFAULT_CHECKPOINT_FILENAME: &str = "{epoch:02}-{step:06}";

const CHECKPOINT_EXT: &str = "ckpt";
const CHECKPOINT_KIND: &str = "checkpoint";

/// Checkpoint and log locations for one run
#[derive(Debug)]
pub struct RunLayout {
    paths: Arc<ProjectPaths>,
    run: Option<String>,
    datestamp: Option<bool>,
    filename: String,
    producer: Option<PathBuf>,
    checkpoint_dir: OnceLock<PathBuf>,
    log_dir: OnceLock<PathBuf>,
}

impl RunLayout {
    pub fn new(paths: Arc<ProjectPaths>) -> Self {
        Self {
            paths,
            run: None,
            datestamp: None,
            filename: DEFAULT_CHECKPOINT_FILENAME.to_string(),
            producer: None,
            checkpoint_dir: OnceLock::new(),
            log_dir: OnceLock::new(),
        }
    }

    /// Name the run; rejected when it is not a single path segment
    pub fn with_run(mut self, run: impl Into<String>) -> Result<Self> {
        let run = run.into();
        validate_run(&run)?;
        self.run = Some(run);
        Ok(self)
    }

    /// Force datestamping on or off for this run's directories
    pub fn with_datestamp(mut self, datestamp: bool) -> Self {
        self.datestamp = Some(datestamp);
        self
    }

    /// Checkpoint filename pattern; `{epoch}` and `{step}` are available
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Track checkpoints as written by `producer` (off by default)
    pub fn with_producer(mut self, producer: impl Into<PathBuf>) -> Self {
        self.producer = Some(producer.into());
        self
    }

    pub fn paths(&self) -> &Arc<ProjectPaths> {
        &self.paths
    }

    pub fn run(&self) -> Option<&str> {
        self.run.as_deref()
    }

    pub fn datestamp(&self) -> Option<bool> {
        self.datestamp
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn producer(&self) -> Option<&Path> {
        self.producer.as_deref()
    }

    /// Checkpoint directory, resolved once
    pub fn checkpoint_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = self.checkpoint_dir.get() {
            return Ok(dir.clone());
        }
        let dir = self.paths.checkpoint_dir(self.run(), self.datestamp)?;
        Ok(self.checkpoint_dir.get_or_init(|| dir).clone())
    }

    /// TensorBoard log directory, resolved once
    pub fn log_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = self.log_dir.get() {
            return Ok(dir.clone());
        }
        let dir = self.paths.tensorboard_run(self.run(), self.datestamp)?;
        Ok(self.log_dir.get_or_init(|| dir).clone())
    }

    /// Checkpoint file for `epoch`/`step` inside [`Self::checkpoint_dir`]
    pub fn checkpoint_path(&self, epoch: u64, step: u64) -> Result<PathBuf> {
        let values = HashMap::from([
            ("epoch".to_string(), epoch.to_string()),
            ("step".to_string(), step.to_string()),
        ]);
        let stem = substitute(&self.filename, &values).map_err(|err| {
            TemplateError::placeholder("checkpoint_filename", &self.filename, err)
        })?;
        let path = self
            .checkpoint_dir()?
            .join(ensure_extension(&stem, Some(CHECKPOINT_EXT)));

        if let Some(producer) = &self.producer {
            self.paths.track_producer(&path, producer, CHECKPOINT_KIND);
        }
        Ok(path)
    }
}
