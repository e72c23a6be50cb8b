//! Template specifications
//!
//! A [`TemplateSpec`] is an immutable description of where files of one kind
//! go: a base location, the root that anchors a relative base, and a pattern
//! that is either a sequence of path segments (one output path) or a
//! mapping of named filenames (one path per key).

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{BaseError, Result, TemplateError};
use crate::resolver::ResolutionContext;

/// Deferred base: computes the base path from the resolution context
pub type BaseFn =
    Arc<dyn Fn(&dyn ResolutionContext) -> std::result::Result<PathBuf, BaseError> + Send + Sync>;

/// Base location of a template
#[derive(Clone)]
pub enum TemplateBase {
    /// Fixed path; relative values are anchored under the template root
    Literal(PathBuf),
    /// Computed from the context at resolution time
    Deferred(BaseFn),
}

impl TemplateBase {
    /// Wrap a closure as a deferred base
    pub fn deferred<F>(f: F) -> Self
    where
        F: Fn(&dyn ResolutionContext) -> std::result::Result<PathBuf, BaseError>
            + Send
            + Sync
            + 'static,
    {
        Self::Deferred(Arc::new(f))
    }
}

impl fmt::Debug for TemplateBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(path) => f.debug_tuple("Literal").field(path).finish(),
            Self::Deferred(_) => f.write_str("Deferred(<fn>)"),
        }
    }
}

impl From<PathBuf> for TemplateBase {
    fn from(path: PathBuf) -> Self {
        Self::Literal(path)
    }
}

impl From<&Path> for TemplateBase {
    fn from(path: &Path) -> Self {
        Self::Literal(path.to_path_buf())
    }
}

impl From<&str> for TemplateBase {
    fn from(path: &str) -> Self {
        Self::Literal(PathBuf::from(path))
    }
}

/// Shape of a template pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePattern {
    /// Path segments joined in order; resolves to a single path
    Segments(Vec<String>),
    /// Logical key -> filename; resolves to a mapping of paths
    Named(BTreeMap<String, String>),
}

impl TemplatePattern {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Segments(segments) => segments.is_empty(),
            Self::Named(files) => files.is_empty(),
        }
    }

    pub fn is_named(&self) -> bool {
        matches!(self, Self::Named(_))
    }

    /// Short label used in diagnostics
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Segments(_) => "segments",
            Self::Named(_) => "named",
        }
    }
}

/// Root directory that anchors a relative template base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateRoot {
    Inputs,
    #[default]
    Outputs,
    Cache,
    /// Anchored like `Outputs`
    Custom,
}

impl TemplateRoot {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inputs => "inputs",
            Self::Outputs => "outputs",
            Self::Cache => "cache",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for TemplateRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of a reusable path shape
#[derive(Debug, Clone)]
pub struct TemplateSpec {
    name: String,
    base: TemplateBase,
    pattern: TemplatePattern,
    root: TemplateRoot,
    datestamp: Option<bool>,
    create: Option<bool>,
}

impl TemplateSpec {
    /// Create a template; an empty pattern is rejected
    pub fn new(
        name: impl Into<String>,
        base: impl Into<TemplateBase>,
        pattern: TemplatePattern,
    ) -> Result<Self> {
        let name = name.into();
        if pattern.is_empty() {
            return Err(TemplateError::EmptyPattern { name });
        }
        Ok(Self {
            name,
            base: base.into(),
            pattern,
            root: TemplateRoot::default(),
            datestamp: None,
            create: None,
        })
    }

    /// Template resolving to one path built from `segments`
    pub fn segments<I, S>(name: impl Into<String>, base: impl Into<TemplateBase>, segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments = segments.into_iter().map(Into::into).collect();
        Self::new(name, base, TemplatePattern::Segments(segments))
    }

    /// Template resolving to one path per `(key, filename)` pair
    pub fn named<I, K, V>(name: impl Into<String>, base: impl Into<TemplateBase>, files: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let files = files
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(name, base, TemplatePattern::Named(files))
    }

    pub fn with_root(mut self, root: TemplateRoot) -> Self {
        self.root = root;
        self
    }

    /// Force datestamping on or off for this template
    pub fn with_datestamp(mut self, datestamp: bool) -> Self {
        self.datestamp = Some(datestamp);
        self
    }

    /// Force directory creation on or off for this template
    pub fn with_create(mut self, create: bool) -> Self {
        self.create = Some(create);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> &TemplateBase {
        &self.base
    }

    pub fn pattern(&self) -> &TemplatePattern {
        &self.pattern
    }

    pub fn root(&self) -> TemplateRoot {
        self.root
    }

    pub fn datestamp(&self) -> Option<bool> {
        self.datestamp
    }

    pub fn create(&self) -> Option<bool> {
        self.create
    }
}
