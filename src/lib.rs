//! Path Templates for Experiment Artifacts
//!
//! Describes where files of a kind live (checkpoints, logs, caches, output
//! matrices) and resolves those descriptions to concrete paths with
//! optional datestamping and on-demand directory creation.
//!
//! Key concepts:
//! - A [`TemplateSpec`] is a base location plus a pattern, either path
//!   segments (one path) or named filenames (one path per key)
//! - A [`ResolutionContext`] supplies roots and defaults; [`ProjectPaths`]
//!   is the concrete one
//! - Datestamp and creation settings resolve call site > template > context
//! - `dry_run` computes paths without touching the filesystem
//!
//! # Example
//!
//! ```no_run
//! use projio::{ArtifactOptions, ProjectPaths};
//!
//! let paths = ProjectPaths::new("/data/experiment");
//! let ckpt = paths.checkpoint_path("model", &ArtifactOptions::new().run("exp1"))?;
//! // /data/experiment/lightning/checkpoints/<date>/exp1/model.ckpt
//! # Ok::<(), projio::TemplateError>(())
//! ```

mod config;
mod datestamp;
mod error;
mod layout;
mod normalize;
mod placeholder;
mod project;
mod registry;
mod resolver;
mod template;
mod tree;

pub use config::{ProjectConfig, CONFIG_ENV};
pub use datestamp::{
    format_datestamp, parse_datestamp, DatestampPlacement, DEFAULT_DATESTAMP_FORMAT,
    FILE_PREFIX_SEPARATOR,
};
pub use error::{BaseError, DatestampParseError, Result, TemplateError};
pub use layout::{RunLayout, DEFAULT_CHECKPOINT_FILENAME};
pub use normalize::{ensure_extension, normalize_path};
pub use placeholder::{escape, placeholder_keys, substitute, PlaceholderError};
pub use project::{
    validate_run, ArtifactKind, ArtifactOptions, PathForOptions, ProjectDescription,
    ProducerRecord, ProjectPaths, ProjectSettings, SettingsOverride, DEFAULT_RUN,
};
pub use registry::{TemplateRegistry, CORE_TEMPLATES, LIGHTNING_TEMPLATES};
pub use resolver::{
    resolve_option, ResolutionContext, ResolveOptions, ResolvedPath, TemplateResolver,
};
pub use template::{BaseFn, TemplateBase, TemplatePattern, TemplateRoot, TemplateSpec};
pub use tree::{render_tree, TreeOptions};
