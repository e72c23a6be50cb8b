//! Project path container
//!
//! [`ProjectPaths`] is the concrete [`ResolutionContext`]: it owns the
//! project root, the input/output/cache roots derived from it, the
//! datestamp and creation defaults, and the template registry. It is an
//! explicitly constructed value; there is no process-wide instance.
//!
//! Copies made with [`ProjectPaths::using`] share one producer ledger.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProjectConfig;
use crate::datestamp::{DatestampPlacement, DEFAULT_DATESTAMP_FORMAT};
use crate::error::{Result, TemplateError};
use crate::normalize::{ensure_extension, normalize_path};
use crate::placeholder;
use crate::registry::TemplateRegistry;
use crate::resolver::{ResolutionContext, ResolveOptions, ResolvedPath, TemplateResolver};
use crate::template::{TemplatePattern, TemplateRoot, TemplateSpec};
use crate::tree::{render_tree, TreeOptions};

// =============================================================================
// SETTINGS
// =============================================================================

/// Datestamp and creation defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    pub use_datestamp: bool,
    pub datestamp_format: String,
    pub datestamp_in: DatestampPlacement,
    pub auto_create: bool,
    pub dry_run: bool,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            use_datestamp: true,
            datestamp_format: DEFAULT_DATESTAMP_FORMAT.to_string(),
            datestamp_in: DatestampPlacement::Dirs,
            auto_create: true,
            dry_run: false,
        }
    }
}

impl ProjectSettings {
    /// Copy of these settings with every set field of `overrides` applied
    pub fn apply(&self, overrides: &SettingsOverride) -> Self {
        Self {
            use_datestamp: overrides.use_datestamp.unwrap_or(self.use_datestamp),
            datestamp_format: overrides
                .datestamp_format
                .clone()
                .unwrap_or_else(|| self.datestamp_format.clone()),
            datestamp_in: overrides.datestamp_in.unwrap_or(self.datestamp_in),
            auto_create: overrides.auto_create.unwrap_or(self.auto_create),
            dry_run: overrides.dry_run.unwrap_or(self.dry_run),
        }
    }
}

/// Partial settings; unset fields keep their current value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverride {
    pub use_datestamp: Option<bool>,
    pub datestamp_format: Option<String>,
    pub datestamp_in: Option<DatestampPlacement>,
    pub auto_create: Option<bool>,
    pub dry_run: Option<bool>,
}

impl SettingsOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn use_datestamp(mut self, value: bool) -> Self {
        self.use_datestamp = Some(value);
        self
    }

    pub fn datestamp_format(mut self, value: impl Into<String>) -> Self {
        self.datestamp_format = Some(value.into());
        self
    }

    pub fn datestamp_in(mut self, value: DatestampPlacement) -> Self {
        self.datestamp_in = Some(value);
        self
    }

    pub fn auto_create(mut self, value: bool) -> Self {
        self.auto_create = Some(value);
        self
    }

    pub fn dry_run(mut self, value: bool) -> Self {
        self.dry_run = Some(value);
        self
    }
}

// =============================================================================
// ARTIFACT KINDS
// =============================================================================

/// Well-known artifact directories addressable by `path_for`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Inputs,
    Outputs,
    Cache,
    Logs,
    Checkpoints,
    Tensorboard,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inputs => "inputs",
            Self::Outputs => "outputs",
            Self::Cache => "cache",
            Self::Logs => "logs",
            Self::Checkpoints => "checkpoints",
            Self::Tensorboard => "tensorboard",
        }
    }

    /// Base relative to the anchoring root
    fn layout(self) -> (&'static str, TemplateRoot) {
        match self {
            Self::Inputs => (".", TemplateRoot::Inputs),
            Self::Outputs => (".", TemplateRoot::Outputs),
            Self::Cache => (".", TemplateRoot::Cache),
            Self::Logs => ("logs", TemplateRoot::Outputs),
            Self::Checkpoints => ("lightning/checkpoints", TemplateRoot::Outputs),
            Self::Tensorboard => ("lightning/tensorboard", TemplateRoot::Outputs),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "inputs" => Ok(Self::Inputs),
            "outputs" => Ok(Self::Outputs),
            "cache" => Ok(Self::Cache),
            "logs" => Ok(Self::Logs),
            "checkpoints" => Ok(Self::Checkpoints),
            "tensorboard" => Ok(Self::Tensorboard),
            other => Err(TemplateError::UnknownKind(other.to_string())),
        }
    }
}

// =============================================================================
// CALL OPTIONS
// =============================================================================

/// Options for the checkpoint/log helpers
#[derive(Debug, Clone, Default)]
pub struct ArtifactOptions {
    pub run: Option<String>,
    /// Extension; the helper's default is used when unset
    pub ext: Option<String>,
    pub datestamp: Option<bool>,
    pub timestamp: Option<NaiveDateTime>,
}

impl ArtifactOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(mut self, run: impl Into<String>) -> Self {
        self.run = Some(run.into());
        self
    }

    pub fn ext(mut self, ext: impl Into<String>) -> Self {
        self.ext = Some(ext.into());
        self
    }

    pub fn datestamp(mut self, datestamp: bool) -> Self {
        self.datestamp = Some(datestamp);
        self
    }

    pub fn timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Options for [`ProjectPaths::path_for`]
#[derive(Debug, Clone, Default)]
pub struct PathForOptions {
    /// Directories between the kind's root and the file
    pub subdir: Vec<String>,
    pub ext: Option<String>,
    pub datestamp: Option<bool>,
    pub timestamp: Option<NaiveDateTime>,
}

impl PathForOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subdir(mut self, segment: impl Into<String>) -> Self {
        self.subdir.push(segment.into());
        self
    }

    pub fn ext(mut self, ext: impl Into<String>) -> Self {
        self.ext = Some(ext.into());
        self
    }

    pub fn datestamp(mut self, datestamp: bool) -> Self {
        self.datestamp = Some(datestamp);
        self
    }

    pub fn timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Serializable snapshot of a [`ProjectPaths`]
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDescription {
    pub root: String,
    pub inputs: String,
    pub outputs: String,
    pub cache: String,
    #[serde(flatten)]
    pub settings: ProjectSettings,
    pub templates: Vec<String>,
}

/// Which producer wrote which target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProducerRecord {
    pub target: PathBuf,
    pub producer: PathBuf,
    pub kind: String,
}

// =============================================================================
// PROJECT PATHS
// =============================================================================

/// Project roots, defaults and templates
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    root: PathBuf,
    /// Explicit roots; `None` follows `root`
    inputs: Option<PathBuf>,
    outputs: Option<PathBuf>,
    cache: Option<PathBuf>,
    settings: ProjectSettings,
    templates: TemplateRegistry,
    producers: Arc<RwLock<Vec<ProducerRecord>>>,
}

impl ProjectPaths {
    /// Project rooted at `root` (resolved against the current directory)
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: normalize_path(Some(root.as_ref()), None),
            inputs: None,
            outputs: None,
            cache: None,
            settings: ProjectSettings::default(),
            templates: TemplateRegistry::with_builtins(),
            producers: Arc::default(),
        }
    }

    /// Project rooted at the current directory
    pub fn current() -> Self {
        Self::new(normalize_path(None, None))
    }

    /// Build from configuration; a missing root means the current directory
    pub fn from_config(config: &ProjectConfig) -> Self {
        let mut paths = match &config.root {
            Some(root) => Self::new(root),
            None => Self::current(),
        };
        if let Some(inputs) = &config.inputs {
            paths = paths.with_inputs(inputs);
        }
        if let Some(outputs) = &config.outputs {
            paths = paths.with_outputs(outputs);
        }
        if let Some(cache) = &config.cache {
            paths = paths.with_cache(cache);
        }
        paths.with_settings(config.settings.clone())
    }

    /// Pin the inputs root; relative paths resolve against the project root
    pub fn with_inputs(mut self, inputs: impl AsRef<Path>) -> Self {
        self.inputs = Some(self.anchor(inputs.as_ref()));
        self
    }

    pub fn with_outputs(mut self, outputs: impl AsRef<Path>) -> Self {
        self.outputs = Some(self.anchor(outputs.as_ref()));
        self
    }

    pub fn with_cache(mut self, cache: impl AsRef<Path>) -> Self {
        self.cache = Some(self.anchor(cache.as_ref()));
        self
    }

    pub fn with_settings(mut self, settings: ProjectSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_templates(mut self, templates: TemplateRegistry) -> Self {
        self.templates = templates;
        self
    }

    /// Copy with `overrides` applied to the settings
    pub fn using(&self, overrides: &SettingsOverride) -> Self {
        let mut copy = self.clone();
        copy.settings = self.settings.apply(overrides);
        copy
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Move the project root; roots that were set explicitly stay put
    pub fn set_root(&mut self, root: impl AsRef<Path>) {
        self.root = normalize_path(Some(root.as_ref()), None);
    }

    pub fn settings(&self) -> &ProjectSettings {
        &self.settings
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    /// Add or replace a template
    pub fn register_template(&mut self, spec: TemplateSpec) -> Option<TemplateSpec> {
        self.templates.register(spec)
    }

    fn anchor(&self, path: &Path) -> PathBuf {
        normalize_path(Some(path), Some(&self.root))
    }

    // -------------------------------------------------------------------------
    // Resolution
    // -------------------------------------------------------------------------

    /// Resolve `spec` against this project
    pub fn resolve(&self, spec: &TemplateSpec, options: &ResolveOptions) -> Result<ResolvedPath> {
        TemplateResolver::resolve(spec, self, options)
    }

    /// Resolve a registered template by name.
    ///
    /// `options.variant` is the run name and must be a single path segment.
    /// When the template's segments already reference `{run}` or
    /// `{variant}`, the run only fills those placeholders and adds no
    /// directory of its own.
    pub fn template_path(&self, name: &str, options: &ResolveOptions) -> Result<ResolvedPath> {
        let spec = self
            .templates
            .get(name)
            .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string()))?;

        let Some(run) = options.variant.as_deref() else {
            return self.resolve(spec, options);
        };
        validate_run(run)?;
        if !references_run(spec.pattern()) {
            return self.resolve(spec, options);
        }

        let mut bound = options.clone();
        bound.variant = None;
        for key in ["run", "variant"] {
            bound
                .substitutions
                .entry(key.to_string())
                .or_insert_with(|| run.to_string());
        }
        self.resolve(spec, &bound)
    }

    fn template_single(&self, name: &str, options: &ResolveOptions) -> Result<PathBuf> {
        self.template_path(name, options)?
            .into_single()
            .ok_or_else(|| TemplateError::UnexpectedShape {
                name: name.to_string(),
                expected: "a single path",
            })
    }

    /// Checkpoint file `<outputs>/lightning/checkpoints/[<date>/][<run>/]<name>.ckpt`
    pub fn checkpoint_path(&self, name: &str, options: &ArtifactOptions) -> Result<PathBuf> {
        self.artifact_path("checkpoint", name, "ckpt", options)
    }

    /// Log file `<outputs>/logs/[<date>/][<run>/]<name>.log`
    pub fn log_path(&self, name: &str, options: &ArtifactOptions) -> Result<PathBuf> {
        self.artifact_path("log", name, "log", options)
    }

    fn artifact_path(
        &self,
        template: &str,
        name: &str,
        default_ext: &str,
        options: &ArtifactOptions,
    ) -> Result<PathBuf> {
        if let Some(run) = &options.run {
            validate_run(run)?;
        }
        let ext = options.ext.as_deref().unwrap_or(default_ext);
        let file_name = ensure_extension(name, Some(ext));

        let resolve = ResolveOptions {
            variant: options.run.clone(),
            datestamp: options.datestamp,
            timestamp: options.timestamp,
            ..ResolveOptions::default()
        }
        .set("name", file_name);
        self.template_single(template, &resolve)
    }

    /// TensorBoard directory for `run` (`default` when unset)
    pub fn tensorboard_run(&self, run: Option<&str>, datestamp: Option<bool>) -> Result<PathBuf> {
        self.run_directory("tensorboard", run, datestamp)
    }

    /// Checkpoint directory for `run` (`default` when unset)
    pub fn checkpoint_dir(&self, run: Option<&str>, datestamp: Option<bool>) -> Result<PathBuf> {
        self.run_directory("checkpoint_dir", run, datestamp)
    }

    fn run_directory(&self, template: &str, run: Option<&str>, datestamp: Option<bool>) -> Result<PathBuf> {
        let run = run.unwrap_or(DEFAULT_RUN);
        validate_run(run)?;
        let options = ResolveOptions {
            datestamp,
            ..ResolveOptions::default()
        }
        .set("run", run);
        self.template_single(template, &options)
    }

    /// Path for `name` under the directory of `kind`.
    ///
    /// Follows the same datestamp and creation rules as registered
    /// templates.
    pub fn path_for(&self, kind: ArtifactKind, name: &str, options: &PathForOptions) -> Result<PathBuf> {
        let (base, root) = kind.layout();
        let file_name = ensure_extension(name, options.ext.as_deref());
        let segments = options
            .subdir
            .iter()
            .map(|segment| placeholder::escape(segment))
            .chain(std::iter::once(placeholder::escape(&file_name)));

        let template_name = format!("path_for:{}", kind);
        // the target is always a file; only its parent is created below
        let spec = TemplateSpec::segments(template_name.as_str(), base, segments)?
            .with_root(root)
            .with_create(false);

        let resolve = ResolveOptions {
            datestamp: options.datestamp,
            timestamp: options.timestamp,
            ..ResolveOptions::default()
        };
        let path = self
            .resolve(&spec, &resolve)?
            .into_single()
            .ok_or(TemplateError::UnexpectedShape {
                name: template_name,
                expected: "a single path",
            })?;
        if let Some(parent) = path.parent() {
            self.ensure_dir(parent)?;
        }
        Ok(path)
    }

    // -------------------------------------------------------------------------
    // Directories
    // -------------------------------------------------------------------------

    /// Directory of `kind`, created when auto-creation is on
    pub fn kind_dir(&self, kind: ArtifactKind) -> Result<PathBuf> {
        let (base, root) = kind.layout();
        let anchor = match root {
            TemplateRoot::Inputs => self.inputs(),
            TemplateRoot::Cache => self.cache(),
            TemplateRoot::Outputs | TemplateRoot::Custom => self.outputs(),
        };
        let dir: PathBuf = anchor.join(base).components().collect();
        self.ensure_dir(&dir)?;
        Ok(dir)
    }

    pub fn logs_dir(&self) -> Result<PathBuf> {
        self.kind_dir(ArtifactKind::Logs)
    }

    pub fn checkpoints_dir(&self) -> Result<PathBuf> {
        self.kind_dir(ArtifactKind::Checkpoints)
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        self.kind_dir(ArtifactKind::Cache)
    }

    fn ensure_dir(&self, dir: &Path) -> Result<()> {
        if !self.settings.auto_create || self.settings.dry_run {
            return Ok(());
        }
        self.create_dir_all(dir)
            .map_err(|source| TemplateError::Filesystem {
                path: dir.to_path_buf(),
                source,
            })
    }

    // -------------------------------------------------------------------------
    // Producers
    // -------------------------------------------------------------------------

    /// Record that `producer` wrote `target`; relative paths are taken
    /// against the project root. Repeating an identical record is a no-op.
    pub fn track_producer(
        &self,
        target: impl AsRef<Path>,
        producer: impl AsRef<Path>,
        kind: impl Into<String>,
    ) -> ProducerRecord {
        let record = ProducerRecord {
            target: self.anchor(target.as_ref()),
            producer: self.anchor(producer.as_ref()),
            kind: kind.into(),
        };

        let mut records = self.producers.write().unwrap_or_else(PoisonError::into_inner);
        if !records.contains(&record) {
            debug!(
                output = %record.target.display(),
                producer = %record.producer.display(),
                kind = %record.kind,
                "tracked producer"
            );
            records.push(record.clone());
        }
        record
    }

    /// Records whose target is `target`
    pub fn producers_of(&self, target: impl AsRef<Path>) -> Vec<ProducerRecord> {
        let target = self.anchor(target.as_ref());
        self.filter_producers(|record| record.target == target)
    }

    /// Records written by `producer`
    pub fn outputs_of(&self, producer: impl AsRef<Path>) -> Vec<ProducerRecord> {
        let producer = self.anchor(producer.as_ref());
        self.filter_producers(|record| record.producer == producer)
    }

    /// Every record, in tracking order
    pub fn producers(&self) -> Vec<ProducerRecord> {
        self.filter_producers(|_| true)
    }

    fn filter_producers(&self, keep: impl Fn(&ProducerRecord) -> bool) -> Vec<ProducerRecord> {
        self.producers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|record| keep(record))
            .cloned()
            .collect()
    }

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------

    pub fn describe(&self) -> ProjectDescription {
        ProjectDescription {
            root: self.root.display().to_string(),
            inputs: self.inputs().display().to_string(),
            outputs: self.outputs().display().to_string(),
            cache: self.cache().display().to_string(),
            settings: self.settings.clone(),
            templates: self.templates.names().into_iter().map(str::to_string).collect(),
        }
    }

    /// Tree of `path` (resolved against the project root)
    pub fn tree(&self, path: impl AsRef<Path>, options: &TreeOptions) -> String {
        render_tree(&self.anchor(path.as_ref()), options)
    }
}

impl ResolutionContext for ProjectPaths {
    fn inputs(&self) -> PathBuf {
        self.inputs.clone().unwrap_or_else(|| self.root.clone())
    }

    fn outputs(&self) -> PathBuf {
        self.outputs.clone().unwrap_or_else(|| self.root.clone())
    }

    fn cache(&self) -> PathBuf {
        self.cache.clone().unwrap_or_else(|| self.root.join("cache"))
    }

    fn use_datestamp(&self) -> bool {
        self.settings.use_datestamp
    }

    fn datestamp_format(&self) -> &str {
        &self.settings.datestamp_format
    }

    fn datestamp_in(&self) -> DatestampPlacement {
        self.settings.datestamp_in
    }

    fn auto_create(&self) -> bool {
        self.settings.auto_create
    }

    fn dry_run(&self) -> bool {
        self.settings.dry_run
    }
}

/// Whether any segment of `pattern` names `{run}` or `{variant}`
fn references_run(pattern: &TemplatePattern) -> bool {
    match pattern {
        TemplatePattern::Segments(segments) => segments.iter().any(|segment| {
            placeholder::placeholder_keys(segment)
                .iter()
                .any(|key| key == "run" || key == "variant")
        }),
        TemplatePattern::Named(_) => false,
    }
}

/// Run name used when a run directory is requested without one
pub const DEFAULT_RUN: &str = "default";

/// A run name must be usable as exactly one path segment
pub fn validate_run(run: &str) -> Result<()> {
    let invalid = run.is_empty()
        || run == "."
        || run == ".."
        || run.contains('/')
        || run.contains('\\');
    if invalid {
        return Err(TemplateError::InvalidRun(run.to_string()));
    }
    Ok(())
}
