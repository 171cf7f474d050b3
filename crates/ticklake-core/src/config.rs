//! Backend configuration with inheritance.
//!
//! A [`BackendConfig`] is a named record of connection parameters plus an
//! optional `extends` pointer to a parent config. Resolution walks the
//! chain from leaf to root, detects cycles, and merges root-to-leaf with an
//! explicit, pure [`merge`] — a child's set fields override the parent's,
//! unset fields inherit unchanged. [`LakeConfig`] is the full configuration
//! surface: the named backend map plus the per-layer bindings, loaded from
//! TOML.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::LakeError;
use crate::Result;

/// The storage technology a backend config materializes into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local filesystem, rooted at `root`.
    Filesystem,
    /// S3-compatible object storage (`bucket`, optional `endpoint`/`region`).
    Object,
    /// Embedded document store, database file at `root`.
    Document,
}

/// A named backend definition. Every field is optional so that unset
/// fields inherit through the `extends` chain; after merging, `kind` (and
/// the fields that kind requires) must be present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Storage technology. Inherited unless explicitly overridden.
    pub kind: Option<BackendKind>,
    /// Filesystem root directory, or the document database file path.
    pub root: Option<PathBuf>,
    /// Object-store bucket name.
    pub bucket: Option<String>,
    /// Object-store endpoint URL (MinIO and other S3-compatibles).
    pub endpoint: Option<String>,
    /// Object-store region.
    pub region: Option<String>,
    /// Key prefix applied to the resolved store via the namespacing
    /// decorator.
    pub prefix: Option<String>,
    /// Name of the parent config to inherit unset fields from.
    pub extends: Option<String>,
}

/// Merge a child config over its (already merged) parent.
///
/// Pure: fields set on the child win, unset fields take the parent's value.
/// The child's `extends` is consumed by chain resolution and never
/// propagates into the merged result.
pub fn merge(child: &BackendConfig, parent: &BackendConfig) -> BackendConfig {
    BackendConfig {
        kind: child.kind.or(parent.kind),
        root: child.root.clone().or_else(|| parent.root.clone()),
        bucket: child.bucket.clone().or_else(|| parent.bucket.clone()),
        endpoint: child.endpoint.clone().or_else(|| parent.endpoint.clone()),
        region: child.region.clone().or_else(|| parent.region.clone()),
        prefix: child.prefix.clone().or_else(|| parent.prefix.clone()),
        extends: None,
    }
}

/// Resolve `name` through its `extends` chain into a single merged config.
///
/// Fails with [`LakeError::Config`] on an unknown name, a cyclic chain, or
/// a merged result with no `kind`.
pub fn resolve_chain(
    configs: &HashMap<String, BackendConfig>,
    name: &str,
) -> Result<BackendConfig> {
    // Walk leaf-to-root, recording the chain.
    let mut chain: Vec<&str> = Vec::new();
    let mut current = name;
    loop {
        if chain.contains(&current) {
            let cycle = chain.join(" -> ");
            return Err(LakeError::config(format!(
                "Cyclic extends chain: {cycle} -> {current}"
            )));
        }
        let config = configs.get(current).ok_or_else(|| {
            let mut available: Vec<&str> = configs.keys().map(String::as_str).collect();
            available.sort_unstable();
            LakeError::config(format!(
                "Unknown backend '{current}'. Available: {}",
                if available.is_empty() {
                    "none".to_string()
                } else {
                    available.join(", ")
                }
            ))
        })?;
        chain.push(current);
        match config.extends.as_deref() {
            Some(parent) => current = parent,
            None => break,
        }
    }

    // Merge root-to-leaf so more specific configs override inherited fields.
    let mut merged = BackendConfig::default();
    for link in chain.iter().rev() {
        merged = merge(&configs[*link], &merged);
    }

    if merged.kind.is_none() {
        return Err(LakeError::config(format!(
            "Backend '{name}' resolved without a kind"
        )));
    }
    Ok(merged)
}

/// Which named backend each lake layer writes through.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerBindings {
    /// Backend name for the raw (bronze) layer.
    pub raw: String,
    /// Backend name for the normalized (silver) layer.
    pub normalized: String,
}

/// The full configuration surface: named backends plus layer bindings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LakeConfig {
    /// Named backend definitions, resolvable through `extends` chains.
    #[serde(default)]
    pub backends: HashMap<String, BackendConfig>,
    /// Environment-level binding of each layer to a backend name.
    pub layers: LayerBindings,
}

impl LakeConfig {
    /// Parse a configuration from a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: LakeConfig = toml::from_str(text)
            .map_err(|e| LakeError::config(format!("Invalid lake configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            LakeError::config(format!("Cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Check that every binding and every `extends` chain resolves.
    fn validate(&self) -> Result<()> {
        resolve_chain(&self.backends, &self.layers.raw)?;
        resolve_chain(&self.backends, &self.layers.normalized)?;
        for name in self.backends.keys() {
            resolve_chain(&self.backends, name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fs_config(root: &str) -> BackendConfig {
        BackendConfig {
            kind: Some(BackendKind::Filesystem),
            root: Some(PathBuf::from(root)),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_child_overrides() {
        let parent = BackendConfig {
            kind: Some(BackendKind::Object),
            bucket: Some("lake".into()),
            region: Some("us-east-1".into()),
            ..Default::default()
        };
        let child = BackendConfig {
            region: Some("eu-west-1".into()),
            ..Default::default()
        };
        let merged = merge(&child, &parent);
        assert_eq!(merged.kind, Some(BackendKind::Object));
        assert_eq!(merged.bucket.as_deref(), Some("lake"));
        assert_eq!(merged.region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn test_resolve_chain_inherits_all_but_overridden() {
        let mut configs = HashMap::new();
        configs.insert("base".to_string(), fs_config("/data/lake"));
        configs.insert(
            "silver".to_string(),
            BackendConfig {
                prefix: Some("silver".into()),
                extends: Some("base".into()),
                ..Default::default()
            },
        );

        let merged = resolve_chain(&configs, "silver").unwrap();
        assert_eq!(merged.kind, Some(BackendKind::Filesystem));
        assert_eq!(merged.root.as_deref(), Some(Path::new("/data/lake")));
        assert_eq!(merged.prefix.as_deref(), Some("silver"));
        assert_eq!(merged.extends, None);
    }

    #[test]
    fn test_resolve_chain_grandparent() {
        let mut configs = HashMap::new();
        configs.insert("root".to_string(), fs_config("/data"));
        configs.insert(
            "mid".to_string(),
            BackendConfig {
                prefix: Some("mid".into()),
                extends: Some("root".into()),
                ..Default::default()
            },
        );
        configs.insert(
            "leaf".to_string(),
            BackendConfig {
                prefix: Some("leaf".into()),
                extends: Some("mid".into()),
                ..Default::default()
            },
        );

        let merged = resolve_chain(&configs, "leaf").unwrap();
        assert_eq!(merged.root.as_deref(), Some(Path::new("/data")));
        assert_eq!(merged.prefix.as_deref(), Some("leaf"));
    }

    #[test]
    fn test_resolve_chain_detects_cycle() {
        let mut configs = HashMap::new();
        configs.insert(
            "a".to_string(),
            BackendConfig {
                extends: Some("b".into()),
                ..Default::default()
            },
        );
        configs.insert(
            "b".to_string(),
            BackendConfig {
                extends: Some("a".into()),
                ..Default::default()
            },
        );

        let err = resolve_chain(&configs, "a").unwrap_err();
        assert!(matches!(err, LakeError::Config { .. }));
        assert!(err.to_string().contains("Cyclic"));
    }

    #[test]
    fn test_resolve_chain_unknown_name() {
        let configs = HashMap::new();
        let err = resolve_chain(&configs, "missing").unwrap_err();
        assert!(matches!(err, LakeError::Config { .. }));
    }

    #[test]
    fn test_resolve_chain_requires_kind() {
        let mut configs = HashMap::new();
        configs.insert(
            "kindless".to_string(),
            BackendConfig {
                prefix: Some("x".into()),
                ..Default::default()
            },
        );
        let err = resolve_chain(&configs, "kindless").unwrap_err();
        assert!(err.to_string().contains("without a kind"));
    }

    #[test]
    fn test_lake_config_from_toml() {
        let config = LakeConfig::from_toml_str(
            r#"
            [backends.lake-fs]
            kind = "filesystem"
            root = "/var/lib/ticklake"

            [backends.bronze]
            extends = "lake-fs"
            prefix = "bronze"

            [backends.silver]
            extends = "lake-fs"
            prefix = "silver"

            [layers]
            raw = "bronze"
            normalized = "silver"
            "#,
        )
        .unwrap();

        assert_eq!(config.layers.raw, "bronze");
        let merged = resolve_chain(&config.backends, "bronze").unwrap();
        assert_eq!(merged.kind, Some(BackendKind::Filesystem));
        assert_eq!(merged.prefix.as_deref(), Some("bronze"));
    }

    #[test]
    fn test_lake_config_rejects_unbound_layer() {
        let err = LakeConfig::from_toml_str(
            r#"
            [backends.lake-fs]
            kind = "filesystem"
            root = "/var/lib/ticklake"

            [layers]
            raw = "lake-fs"
            normalized = "nonexistent"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, LakeError::Config { .. }));
    }
}
