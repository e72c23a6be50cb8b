//! Template Resolver
//!
//! Turns a [`TemplateSpec`] into concrete filesystem paths.
//!
//! Resolution steps:
//! 1. Base - literal or computed from the context, anchored under the
//!    template root when relative
//! 2. Datestamp decision - call site > template > context default
//! 3. Substitution values - caller values, plus `variant`/`run` when a
//!    variant is given and the caller did not bind them
//! 4. Directory datestamp - extra segment under the base (`dirs`/`both`)
//! 5. Pattern expansion - one path for segments, one path per key for
//!    named patterns; filename datestamp prefix (`files`/`both`)
//! 6. Auto-creation - call site > template > context default, never
//!    under dry run
//!
//! The resolver holds no state and performs no caching.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::debug;

use crate::datestamp::{format_datestamp, DatestampPlacement, FILE_PREFIX_SEPARATOR};
use crate::error::{Result, TemplateError};
use crate::placeholder::substitute;
use crate::template::{TemplateBase, TemplatePattern, TemplateRoot, TemplateSpec};

/// Roots and defaults a template is resolved against
pub trait ResolutionContext {
    fn inputs(&self) -> PathBuf;
    fn outputs(&self) -> PathBuf;
    fn cache(&self) -> PathBuf;

    /// Default for applying a datestamp
    fn use_datestamp(&self) -> bool;
    /// strftime-style datestamp pattern
    fn datestamp_format(&self) -> &str;
    /// Datestamp placement policy; not overridable per template or call
    fn datestamp_in(&self) -> DatestampPlacement;
    /// Default for creating directories
    fn auto_create(&self) -> bool;
    /// Suppresses every directory creation
    fn dry_run(&self) -> bool;

    /// Render the datestamp for `timestamp` (now when absent)
    fn datestamp_value(&self, timestamp: Option<NaiveDateTime>) -> String {
        format_datestamp(timestamp, self.datestamp_format())
    }

    /// Create `path` and its parents; must succeed if it already exists
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }
}

/// Pick the most specific setting: call site, then template, then default
pub fn resolve_option(call_site: Option<bool>, template: Option<bool>, default: bool) -> bool {
    call_site.or(template).unwrap_or(default)
}

/// Per-call inputs to a resolution
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Run/variant name; inserted as a directory and bound to `{variant}`/`{run}`
    pub variant: Option<String>,
    /// Placeholder values
    pub substitutions: HashMap<String, String>,
    /// Call-site datestamp override
    pub datestamp: Option<bool>,
    /// Call-site directory creation override
    pub create: Option<bool>,
    /// Timestamp to render instead of now
    pub timestamp: Option<NaiveDateTime>,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    /// Bind a placeholder value
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.substitutions.insert(key.into(), value.into());
        self
    }

    pub fn datestamp(mut self, datestamp: bool) -> Self {
        self.datestamp = Some(datestamp);
        self
    }

    pub fn create(mut self, create: bool) -> Self {
        self.create = Some(create);
        self
    }

    pub fn timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Output of a resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPath {
    /// From a segments pattern
    Single(PathBuf),
    /// From a named pattern
    Named(BTreeMap<String, PathBuf>),
}

impl ResolvedPath {
    pub fn as_single(&self) -> Option<&Path> {
        match self {
            Self::Single(path) => Some(path),
            Self::Named(_) => None,
        }
    }

    pub fn as_named(&self) -> Option<&BTreeMap<String, PathBuf>> {
        match self {
            Self::Single(_) => None,
            Self::Named(paths) => Some(paths),
        }
    }

    pub fn into_single(self) -> Option<PathBuf> {
        match self {
            Self::Single(path) => Some(path),
            Self::Named(_) => None,
        }
    }

    pub fn into_named(self) -> Option<BTreeMap<String, PathBuf>> {
        match self {
            Self::Single(_) => None,
            Self::Named(paths) => Some(paths),
        }
    }
}

/// Resolves templates against a context
pub struct TemplateResolver;

impl TemplateResolver {
    pub fn resolve(
        spec: &TemplateSpec,
        ctx: &dyn ResolutionContext,
        options: &ResolveOptions,
    ) -> Result<ResolvedPath> {
        let base = Self::resolve_base(spec, ctx)?;

        let apply_datestamp =
            resolve_option(options.datestamp, spec.datestamp(), ctx.use_datestamp());
        let placement = ctx.datestamp_in();
        let stamp = apply_datestamp.then(|| ctx.datestamp_value(options.timestamp));

        let values = Self::substitution_values(options);

        let base = match &stamp {
            Some(stamp) if placement.in_dirs() => base.join(stamp),
            _ => base,
        };

        let create = !ctx.dry_run()
            && resolve_option(options.create, spec.create(), ctx.auto_create());

        debug!(
            template = spec.name(),
            variant = options.variant.as_deref(),
            datestamp = stamp.as_deref(),
            placement = %placement,
            create,
            "resolving template"
        );

        match spec.pattern() {
            TemplatePattern::Named(files) => {
                let mut paths = BTreeMap::new();
                for (key, pattern) in files {
                    let path = base.join(Self::expand(spec, pattern, &values)?);
                    if create {
                        if let Some(parent) = path.parent() {
                            Self::create_dir(ctx, parent)?;
                        }
                    }
                    paths.insert(key.clone(), path);
                }
                Ok(ResolvedPath::Named(paths))
            }
            TemplatePattern::Segments(segments) => {
                let mut target = base;
                if let Some(variant) = &options.variant {
                    target.push(variant);
                }
                for segment in segments {
                    target.push(Self::expand(spec, segment, &values)?);
                }

                if let Some(stamp) = &stamp {
                    if placement.in_files() {
                        target = Self::prefix_file_name(target, stamp);
                    }
                }

                if create {
                    // A suffix is taken to mean "this is a file"
                    let dir = if target.extension().is_some() {
                        target.parent()
                    } else {
                        Some(target.as_path())
                    };
                    if let Some(dir) = dir {
                        Self::create_dir(ctx, dir)?;
                    }
                }
                Ok(ResolvedPath::Single(target))
            }
        }
    }

    fn resolve_base(spec: &TemplateSpec, ctx: &dyn ResolutionContext) -> Result<PathBuf> {
        let base = match spec.base() {
            TemplateBase::Literal(path) => path.clone(),
            TemplateBase::Deferred(compute) => {
                compute(ctx).map_err(|source| TemplateError::BaseResolution {
                    name: spec.name().to_string(),
                    source,
                })?
            }
        };

        if base.is_absolute() {
            return Ok(base);
        }

        let anchor = match spec.root() {
            TemplateRoot::Inputs => ctx.inputs(),
            TemplateRoot::Cache => ctx.cache(),
            TemplateRoot::Outputs | TemplateRoot::Custom => ctx.outputs(),
        };
        // collecting components drops interior `.` segments
        Ok(anchor.join(base).components().collect())
    }

    fn substitution_values(options: &ResolveOptions) -> HashMap<String, String> {
        let mut values = options.substitutions.clone();
        if let Some(variant) = &options.variant {
            for key in ["variant", "run"] {
                values
                    .entry(key.to_string())
                    .or_insert_with(|| variant.clone());
            }
        }
        values
    }

    fn expand(spec: &TemplateSpec, pattern: &str, values: &HashMap<String, String>) -> Result<String> {
        substitute(pattern, values)
            .map_err(|err| TemplateError::placeholder(spec.name(), pattern, err))
    }

    /// Replace the last segment with `<stamp>__<segment>`
    fn prefix_file_name(target: PathBuf, stamp: &str) -> PathBuf {
        match target.file_name() {
            Some(name) => {
                let prefixed = format!(
                    "{}{}{}",
                    stamp,
                    FILE_PREFIX_SEPARATOR,
                    name.to_string_lossy()
                );
                target.with_file_name(prefixed)
            }
            None => target,
        }
    }

    fn create_dir(ctx: &dyn ResolutionContext, dir: &Path) -> Result<()> {
        ctx.create_dir_all(dir)
            .map_err(|source| TemplateError::Filesystem {
                path: dir.to_path_buf(),
                source,
            })?;
        debug!(path = %dir.display(), "ensured directory");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    /// Context double that records directory creation instead of touching disk
    struct MockContext {
        base: PathBuf,
        use_datestamp: bool,
        datestamp_in: DatestampPlacement,
        auto_create: bool,
        dry_run: bool,
        stamp: Option<String>,
        created: RefCell<Vec<PathBuf>>,
    }

    impl MockContext {
        fn new() -> Self {
            Self {
                base: PathBuf::from("/project"),
                use_datestamp: false,
                datestamp_in: DatestampPlacement::Dirs,
                auto_create: false,
                dry_run: false,
                stamp: Some("DATE".to_string()),
                created: RefCell::new(Vec::new()),
            }
        }

        fn created(&self) -> Vec<PathBuf> {
            self.created.borrow().clone()
        }
    }

    impl ResolutionContext for MockContext {
        fn inputs(&self) -> PathBuf {
            self.base.join("inputs")
        }

        fn outputs(&self) -> PathBuf {
            self.base.join("outputs")
        }

        fn cache(&self) -> PathBuf {
            self.base.join("cache")
        }

        fn use_datestamp(&self) -> bool {
            self.use_datestamp
        }

        fn datestamp_format(&self) -> &str {
            "%Y_%m_%d"
        }

        fn datestamp_in(&self) -> DatestampPlacement {
            self.datestamp_in
        }

        fn auto_create(&self) -> bool {
            self.auto_create
        }

        fn dry_run(&self) -> bool {
            self.dry_run
        }

        fn datestamp_value(&self, timestamp: Option<NaiveDateTime>) -> String {
            match &self.stamp {
                Some(stamp) => stamp.clone(),
                None => format_datestamp(timestamp, self.datestamp_format()),
            }
        }

        fn create_dir_all(&self, path: &Path) -> io::Result<()> {
            self.created.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }

    fn outputs_base() -> TemplateBase {
        TemplateBase::deferred(|ctx| Ok(ctx.outputs()))
    }

    fn single(spec: &TemplateSpec, ctx: &MockContext, options: &ResolveOptions) -> PathBuf {
        TemplateResolver::resolve(spec, ctx, options)
            .unwrap()
            .into_single()
            .unwrap()
    }

    #[test]
    fn test_resolve_option_precedence() {
        assert!(!resolve_option(Some(false), Some(true), true));
        assert!(resolve_option(None, Some(true), false));
        assert!(resolve_option(None, None, true));
        assert!(!resolve_option(None, None, false));
    }

    #[test]
    fn test_mapping_pattern_with_variant() {
        let ctx = MockContext::new();
        let spec =
            TemplateSpec::named("pair", outputs_base(), [("a", "{run}.txt"), ("b", "fixed.log")])
                .unwrap();

        let paths = TemplateResolver::resolve(&spec, &ctx, &ResolveOptions::new().variant("exp1"))
            .unwrap()
            .into_named()
            .unwrap();

        assert_eq!(paths["a"], PathBuf::from("/project/outputs/exp1.txt"));
        assert_eq!(paths["b"], PathBuf::from("/project/outputs/fixed.log"));
    }

    #[test]
    fn test_sequence_pattern_variant_is_directory_and_placeholder() {
        let ctx = MockContext::new();
        let spec = TemplateSpec::segments("test", outputs_base(), ["{run}"]).unwrap();

        let path = single(&spec, &ctx, &ResolveOptions::new().variant("exp1"));
        assert_eq!(path, PathBuf::from("/project/outputs/exp1/exp1"));
    }

    #[test]
    fn test_custom_substitution() {
        let ctx = MockContext::new();
        let spec = TemplateSpec::segments("test", outputs_base(), ["{custom}"]).unwrap();

        let path = single(&spec, &ctx, &ResolveOptions::new().set("custom", "value"));
        assert_eq!(path, PathBuf::from("/project/outputs/value"));
    }

    #[test]
    fn test_caller_values_win_over_variant() {
        let ctx = MockContext::new();
        let spec = TemplateSpec::segments("test", outputs_base(), ["{run}", "{variant}.ckpt"]).unwrap();

        let options = ResolveOptions::new().variant("exp1").set("run", "mine");
        let path = single(&spec, &ctx, &options);
        assert_eq!(path, PathBuf::from("/project/outputs/exp1/mine/exp1.ckpt"));
    }

    #[test]
    fn test_missing_key_is_template_format_error() {
        let ctx = MockContext::new();
        let spec = TemplateSpec::segments("ckpt", outputs_base(), ["{model}.ckpt"]).unwrap();

        let err = TemplateResolver::resolve(&spec, &ctx, &ResolveOptions::new()).unwrap_err();
        match err {
            TemplateError::TemplateFormat { name, pattern, key } => {
                assert_eq!(name, "ckpt");
                assert_eq!(pattern, "{model}.ckpt");
                assert_eq!(key, "model");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_placeholder_is_template_syntax_error() {
        let ctx = MockContext::new();
        let spec = TemplateSpec::segments("ckpt", outputs_base(), ["{bad key}.ckpt"]).unwrap();

        let err = TemplateResolver::resolve(&spec, &ctx, &ResolveOptions::new()).unwrap_err();
        match err {
            TemplateError::TemplateSyntax { name, fragment, .. } => {
                assert_eq!(name, "ckpt");
                assert_eq!(fragment, "{bad key}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(ctx.created().is_empty());
    }

    #[test]
    fn test_base_function_failure() {
        let ctx = MockContext::new();
        let base = TemplateBase::deferred(|_| Err("no active run".into()));
        let spec = TemplateSpec::segments("run_dir", base, ["x"]).unwrap();

        let err = TemplateResolver::resolve(&spec, &ctx, &ResolveOptions::new()).unwrap_err();
        assert!(matches!(err, TemplateError::BaseResolution { ref name, .. } if name == "run_dir"));
        assert!(err.to_string().contains("no active run"));
    }

    #[test]
    fn test_relative_base_anchored_by_root() {
        let ctx = MockContext::new();
        let cases = [
            (TemplateRoot::Inputs, "/project/inputs/data/x"),
            (TemplateRoot::Outputs, "/project/outputs/data/x"),
            (TemplateRoot::Cache, "/project/cache/data/x"),
            (TemplateRoot::Custom, "/project/outputs/data/x"),
        ];
        for (root, expected) in cases {
            let spec = TemplateSpec::segments("t", "data", ["x"]).unwrap().with_root(root);
            assert_eq!(single(&spec, &ctx, &ResolveOptions::new()), PathBuf::from(expected));
        }
    }

    #[test]
    fn test_absolute_base_not_anchored() {
        let ctx = MockContext::new();
        let spec = TemplateSpec::segments("t", "/elsewhere", ["x"])
            .unwrap()
            .with_root(TemplateRoot::Inputs);
        assert_eq!(single(&spec, &ctx, &ResolveOptions::new()), PathBuf::from("/elsewhere/x"));
    }

    #[test]
    fn test_dot_base_resolves_to_root() {
        let ctx = MockContext::new();
        let spec = TemplateSpec::segments("t", ".", ["x.txt"]).unwrap();
        let path = single(&spec, &ctx, &ResolveOptions::new());
        assert_eq!(path.to_string_lossy(), "/project/outputs/x.txt");
    }

    #[test]
    fn test_datestamp_in_dirs() {
        let mut ctx = MockContext::new();
        ctx.use_datestamp = true;
        let spec = TemplateSpec::segments("ckpt", "ckpts", ["{name}.ckpt"]).unwrap();

        let path = single(&spec, &ctx, &ResolveOptions::new().variant("run1").set("name", "model"));
        assert_eq!(path, PathBuf::from("/project/outputs/ckpts/DATE/run1/model.ckpt"));
    }

    #[test]
    fn test_datestamp_in_files_only_prefixes_last_segment() {
        let mut ctx = MockContext::new();
        ctx.use_datestamp = true;
        ctx.datestamp_in = DatestampPlacement::Files;
        let spec = TemplateSpec::segments("ckpt", "ckpts", ["sub", "{name}.ckpt"]).unwrap();

        let path = single(&spec, &ctx, &ResolveOptions::new().variant("run1").set("name", "model"));
        assert_eq!(path, PathBuf::from("/project/outputs/ckpts/run1/sub/DATE__model.ckpt"));
        assert_eq!(path.components().filter(|c| c.as_os_str().to_string_lossy().contains("DATE")).count(), 1);
    }

    #[test]
    fn test_datestamp_in_both_uses_same_timestamp() {
        let mut ctx = MockContext::new();
        ctx.use_datestamp = true;
        ctx.datestamp_in = DatestampPlacement::Both;
        ctx.stamp = None;
        let spec = TemplateSpec::segments("ckpt", "ckpts", ["model.ckpt"]).unwrap();
        let when = chrono::NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();

        let path = single(&spec, &ctx, &ResolveOptions::new().timestamp(when));
        assert_eq!(path, PathBuf::from("/project/outputs/ckpts/2024_03_15/2024_03_15__model.ckpt"));
    }

    #[test]
    fn test_named_pattern_gets_directory_datestamp_only() {
        let mut ctx = MockContext::new();
        ctx.use_datestamp = true;
        ctx.datestamp_in = DatestampPlacement::Both;
        let spec = TemplateSpec::named("m", ".", [("matrix", "matrix.mtx")]).unwrap();

        let paths = TemplateResolver::resolve(&spec, &ctx, &ResolveOptions::new())
            .unwrap()
            .into_named()
            .unwrap();
        assert_eq!(paths["matrix"], PathBuf::from("/project/outputs/DATE/matrix.mtx"));
    }

    #[test]
    fn test_call_site_override_beats_template_and_context() {
        let mut ctx = MockContext::new();
        ctx.use_datestamp = true;
        let spec = TemplateSpec::segments("tb", "tb", ["{run}"]).unwrap().with_datestamp(true);

        let path = single(&spec, &ctx, &ResolveOptions::new().set("run", "abc").datestamp(false));
        assert_eq!(path, PathBuf::from("/project/outputs/tb/abc"));
    }

    #[test]
    fn test_template_override_beats_context() {
        let ctx = MockContext::new();
        let spec = TemplateSpec::segments("tb", "tb", ["{run}"]).unwrap().with_datestamp(true);

        let path = single(&spec, &ctx, &ResolveOptions::new().set("run", "abc"));
        assert_eq!(path, PathBuf::from("/project/outputs/tb/DATE/abc"));
    }

    #[test]
    fn test_dry_run_never_creates() {
        let mut ctx = MockContext::new();
        ctx.dry_run = true;
        ctx.auto_create = true;
        let spec = TemplateSpec::segments("t", "logs", ["train.log"]).unwrap().with_create(true);
        let named = TemplateSpec::named("n", ".", [("a", "a.txt")]).unwrap().with_create(true);

        TemplateResolver::resolve(&spec, &ctx, &ResolveOptions::new().create(true)).unwrap();
        TemplateResolver::resolve(&named, &ctx, &ResolveOptions::new().create(true)).unwrap();

        assert!(ctx.created().is_empty());
    }

    #[test]
    fn test_create_parent_for_file_like_target() {
        let mut ctx = MockContext::new();
        ctx.auto_create = true;
        let spec = TemplateSpec::segments("t", "logs", ["train.log"]).unwrap();

        TemplateResolver::resolve(&spec, &ctx, &ResolveOptions::new()).unwrap();
        assert_eq!(ctx.created(), vec![PathBuf::from("/project/outputs/logs")]);
    }

    #[test]
    fn test_create_target_for_directory_like_target() {
        let mut ctx = MockContext::new();
        ctx.auto_create = true;
        let spec = TemplateSpec::segments("tb", "tensorboard", ["{run}"]).unwrap();

        TemplateResolver::resolve(&spec, &ctx, &ResolveOptions::new().set("run", "abc")).unwrap();
        assert_eq!(ctx.created(), vec![PathBuf::from("/project/outputs/tensorboard/abc")]);
    }

    #[test]
    fn test_dotted_directory_name_is_treated_as_file() {
        let mut ctx = MockContext::new();
        ctx.auto_create = true;
        let spec = TemplateSpec::segments("versions", "releases", ["v1.2"]).unwrap();

        TemplateResolver::resolve(&spec, &ctx, &ResolveOptions::new()).unwrap();
        assert_eq!(ctx.created(), vec![PathBuf::from("/project/outputs/releases")]);
    }

    #[test]
    fn test_mapping_creates_each_parent() {
        let ctx = MockContext::new();
        let spec = TemplateSpec::named("m", "out", [("a", "one/a.txt"), ("b", "two/b.txt")])
            .unwrap()
            .with_create(true);

        TemplateResolver::resolve(&spec, &ctx, &ResolveOptions::new()).unwrap();
        assert_eq!(
            ctx.created(),
            vec![
                PathBuf::from("/project/outputs/out/one"),
                PathBuf::from("/project/outputs/out/two"),
            ]
        );
    }

    #[test]
    fn test_call_site_create_false_suppresses_creation() {
        let mut ctx = MockContext::new();
        ctx.auto_create = true;
        let spec = TemplateSpec::segments("t", "logs", ["train.log"]).unwrap().with_create(true);

        TemplateResolver::resolve(&spec, &ctx, &ResolveOptions::new().create(false)).unwrap();
        assert!(ctx.created().is_empty());
    }
}
