//! Template Registry
//!
//! Named collection of [`TemplateSpec`]s, pre-populated with the built-in
//! artifact layouts.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::template::{TemplateRoot, TemplateSpec};

/// Names of the general-purpose built-in templates
pub const CORE_TEMPLATES: &[&str] = &["filtered_matrix", "log", "cache_file"];

/// Names of the built-in training-run templates
pub const LIGHTNING_TEMPLATES: &[&str] = &["checkpoint", "checkpoint_dir", "tensorboard"];

/// Registry of templates by name
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, TemplateSpec>,
}

impl TemplateRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the core and lightning built-ins
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for spec in core_templates().into_iter().chain(lightning_templates()) {
            registry.register(spec);
        }
        registry
    }

    /// Add or replace a template, returning the one it replaced
    pub fn register(&mut self, spec: TemplateSpec) -> Option<TemplateSpec> {
        self.templates.insert(spec.name().to_string(), spec)
    }

    pub fn get(&self, name: &str) -> Option<&TemplateSpec> {
        self.templates.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Template names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TemplateSpec> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn core_templates() -> Vec<TemplateSpec> {
    build(vec![
        TemplateSpec::named(
            "filtered_matrix",
            ".",
            [
                ("matrix", "matrix.mtx"),
                ("barcodes", "barcodes.tsv.gz"),
                ("features", "features.tsv.gz"),
            ],
        ),
        TemplateSpec::segments("log", "logs", ["{name}"]),
        TemplateSpec::segments("cache_file", ".", ["{name}"])
            .map(|spec| spec.with_root(TemplateRoot::Cache)),
    ])
}

fn lightning_templates() -> Vec<TemplateSpec> {
    build(vec![
        TemplateSpec::segments("checkpoint", "lightning/checkpoints", ["{name}"]),
        TemplateSpec::segments("checkpoint_dir", "lightning/checkpoints", ["{run}"]),
        TemplateSpec::segments("tensorboard", "lightning/tensorboard", ["{run}"]),
    ])
}

/// Built-ins all carry non-empty patterns, so construction cannot fail
fn build(specs: Vec<Result<TemplateSpec>>) -> Vec<TemplateSpec> {
    specs
        .into_iter()
        .filter_map(|spec| match spec {
            Ok(spec) => Some(spec),
            Err(e) => {
                tracing::error!(error = %e, "skipping invalid built-in template");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplatePattern;

    #[test]
    fn test_builtins_registered() {
        let registry = TemplateRegistry::with_builtins();
        for name in CORE_TEMPLATES.iter().chain(LIGHTNING_TEMPLATES) {
            assert!(registry.contains(name), "missing built-in {name}");
        }
        assert_eq!(registry.len(), CORE_TEMPLATES.len() + LIGHTNING_TEMPLATES.len());
    }

    #[test]
    fn test_filtered_matrix_is_named() {
        let registry = TemplateRegistry::with_builtins();
        let spec = registry.get("filtered_matrix").unwrap();
        match spec.pattern() {
            TemplatePattern::Named(files) => {
                assert_eq!(files["matrix"], "matrix.mtx");
                assert_eq!(files.len(), 3);
            }
            other => panic!("unexpected pattern {other:?}"),
        }
    }

    #[test]
    fn test_cache_file_uses_cache_root() {
        let registry = TemplateRegistry::with_builtins();
        assert_eq!(registry.get("cache_file").unwrap().root(), TemplateRoot::Cache);
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = TemplateRegistry::new();
        assert!(registry.is_empty());

        let first = TemplateSpec::segments("t", "a", ["x"]).unwrap();
        let second = TemplateSpec::segments("t", "b", ["y"]).unwrap();
        assert!(registry.register(first).is_none());

        let replaced = registry.register(second).unwrap();
        assert_eq!(
            replaced.pattern(),
            &TemplatePattern::Segments(vec!["x".to_string()])
        );
        assert_eq!(registry.names(), vec!["t"]);
    }
}
