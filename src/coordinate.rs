//! Coordinate resolution for secret placeholders.
//!
//! A placeholder is a scalar string that points at a field of a record in Vault.
//! Resolution is a pure function of the placeholder text, its position in the
//! document and the configured defaults. No I/O happens here.

use std::fmt;

/// Field name used when a placeholder does not name one
pub const SENTINEL_FIELD: &str = "value";

/// Token replaced by `/<environment>` (or removed) inside templated paths
pub const ENVIRONMENT_TOKEN: &str = "{environment}";

/// Segment layout of a templated placeholder after the trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateGrammar {
    /// `path[:key]`, used with KV v2
    PathKey,
    /// `path[:mount_override[:key]]`, used with KV v1
    PathMountKey,
}

/// Field addressed inside a secret record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKey {
    Named(String),
    Sentinel,
}

impl FieldKey {
    pub fn as_str(&self) -> &str {
        match self {
            FieldKey::Named(name) => name,
            FieldKey::Sentinel => SENTINEL_FIELD,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, FieldKey::Sentinel)
    }
}

/// Fully-qualified location of a secret field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coordinate {
    pub mount_point: String,
    pub secret_path: String,
    pub field_key: FieldKey,
    /// The placeholder named its mount (leading `/` or a mount override)
    /// instead of falling back to the default one
    pub explicit_mount: bool,
}

impl Coordinate {
    /// Path used by the flat KV variant, relative to `/v1/`.
    ///
    /// A relative placeholder is sent as written; only a named mount is
    /// prefixed.
    pub fn flat_path(&self) -> String {
        if self.explicit_mount {
            format!("{}/{}", self.mount_point, self.secret_path)
        } else {
            self.secret_path.clone()
        }
    }

    /// Render the templated placeholder that addresses this coordinate.
    pub fn to_placeholder(&self, trigger: &str) -> String {
        format!("{}:{}", trigger.trim_end_matches(':'), self)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.explicit_mount {
            write!(f, "/{}/", self.mount_point)?;
        }
        write!(f, "{}:{}", self.secret_path, self.field_key.as_str())
    }
}

/// Outcome of running the resolver over a scalar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    NotAPlaceholder,
    Resolved(Coordinate),
}

/// A placeholder was recognised but its coordinate cannot be derived
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionError {
    pub placeholder: String,
    pub reason: String,
}

impl ResolutionError {
    fn new(placeholder: &str, reason: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}': {}", self.placeholder, self.reason)
    }
}

impl std::error::Error for ResolutionError {}

/// Defaults the resolver falls back to
#[derive(Debug, Clone)]
pub struct ResolverDefaults {
    /// Prefix marking a templated placeholder (`VAULT:`)
    pub trigger: String,
    /// Bare value marking a positional placeholder (`changeme`)
    pub delimiter: String,
    pub mount_point: String,
    /// Prefix for positional coordinates
    pub base_path: String,
    /// Repository identifier inserted after the base path
    pub project: String,
    pub environment: Option<String>,
    pub grammar: TemplateGrammar,
}

/// Split the text after the trigger into `:`-delimited segments.
///
/// Returns `None` when `raw` does not carry the trigger. A trigger configured
/// with or without its trailing `:` matches the same placeholders.
pub fn tokenize<'a>(raw: &'a str, trigger: &str) -> Option<Vec<&'a str>> {
    let prefix = trigger.trim_end_matches(':');
    let rest = raw.strip_prefix(prefix)?.strip_prefix(':')?;
    Some(rest.split(':').collect())
}

/// Parsed form of a templated placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
struct TemplateParts<'a> {
    path: &'a str,
    mount_override: Option<&'a str>,
    key: Option<String>,
}

fn parse_template<'a>(segments: &[&'a str], grammar: TemplateGrammar) -> TemplateParts<'a> {
    let path = segments.first().copied().unwrap_or("");
    let non_empty = |s: &&'a str| !s.is_empty();

    match grammar {
        TemplateGrammar::PathKey => {
            let key = if segments.len() > 1 {
                Some(segments[1..].join(":")).filter(|k| !k.is_empty())
            } else {
                None
            };
            TemplateParts {
                path,
                mount_override: None,
                key,
            }
        }
        TemplateGrammar::PathMountKey => match segments.len() {
            0 | 1 => TemplateParts {
                path,
                mount_override: None,
                key: None,
            },
            2 => TemplateParts {
                path,
                mount_override: None,
                key: Some(segments[1].to_string()).filter(|k| !k.is_empty()),
            },
            _ => TemplateParts {
                path,
                mount_override: Some(segments[1]).filter(non_empty),
                key: Some(segments[2..].join(":")).filter(|k| !k.is_empty()),
            },
        },
    }
}

/// Derives coordinates from placeholders
pub struct CoordinateResolver<'a> {
    defaults: &'a ResolverDefaults,
}

impl<'a> CoordinateResolver<'a> {
    pub fn new(defaults: &'a ResolverDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &ResolverDefaults {
        self.defaults
    }

    /// Resolve a placeholder found while reading from the store
    pub fn resolve_read(&self, raw: &str) -> Result<Resolution, ResolutionError> {
        match tokenize(raw, &self.defaults.trigger) {
            Some(segments) => self.resolve_template(raw, &segments).map(Resolution::Resolved),
            None => Ok(Resolution::NotAPlaceholder),
        }
    }

    /// Resolve a placeholder found while populating the store.
    ///
    /// `ancestors` is the key chain above the entry and `key` its own mapping
    /// key, if it has one.
    pub fn resolve_write(
        &self,
        raw: &str,
        ancestors: &[String],
        key: Option<&str>,
    ) -> Result<Resolution, ResolutionError> {
        if raw == self.defaults.delimiter {
            let key = key.ok_or_else(|| {
                ResolutionError::new(raw, "positional placeholder must be a mapping value")
            })?;
            return self.resolve_positional(raw, ancestors, key).map(Resolution::Resolved);
        }

        self.resolve_read(raw)
    }

    fn resolve_template(
        &self,
        raw: &str,
        segments: &[&str],
    ) -> Result<Coordinate, ResolutionError> {
        let parts = parse_template(segments, self.defaults.grammar);
        let path = self.substitute_environment(parts.path);
        let (mount_point, secret_path, explicit_mount) = self.split_mount(raw, &path)?;

        Ok(Coordinate {
            mount_point: parts
                .mount_override
                .map(str::to_string)
                .unwrap_or(mount_point),
            secret_path,
            field_key: parts.key.map(FieldKey::Named).unwrap_or(FieldKey::Sentinel),
            explicit_mount: explicit_mount || parts.mount_override.is_some(),
        })
    }

    fn resolve_positional(
        &self,
        raw: &str,
        ancestors: &[String],
        key: &str,
    ) -> Result<Coordinate, ResolutionError> {
        let mut path = self.defaults.base_path.trim_end_matches('/').to_string();

        if !self.defaults.project.is_empty() {
            path.push('/');
            path.push_str(&self.defaults.project);
        }

        if let Some(environment) = self.environment() {
            path.push('/');
            path.push_str(environment);
        }

        for segment in ancestors.iter().map(String::as_str).chain(std::iter::once(key)) {
            path.push('/');
            path.push_str(segment);
        }

        let (mount_point, secret_path, explicit_mount) = self.split_mount(raw, &path)?;

        Ok(Coordinate {
            mount_point,
            secret_path,
            field_key: FieldKey::Sentinel,
            explicit_mount,
        })
    }

    fn environment(&self) -> Option<&str> {
        self.defaults
            .environment
            .as_deref()
            .filter(|env| !env.is_empty())
    }

    fn substitute_environment(&self, path: &str) -> String {
        let replacement = self
            .environment()
            .map(|env| format!("/{}", env))
            .unwrap_or_default();
        path.replace(ENVIRONMENT_TOKEN, &replacement)
    }

    /// Apply the leading-slash rule: `/mount/a/b` names its own mount,
    /// anything else lives under the configured default. The flag tells
    /// which of the two applied.
    fn split_mount(
        &self,
        raw: &str,
        path: &str,
    ) -> Result<(String, String, bool), ResolutionError> {
        let (mount_point, rest, explicit) = match path.strip_prefix('/') {
            Some(absolute) => {
                let mut segments = absolute.split('/').filter(|s| !s.is_empty());
                let mount = segments
                    .next()
                    .ok_or_else(|| ResolutionError::new(raw, "missing mount point in path"))?;
                (mount.to_string(), segments.collect::<Vec<_>>().join("/"), true)
            }
            None => (
                self.defaults.mount_point.clone(),
                path.split('/')
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join("/"),
                false,
            ),
        };

        if rest.is_empty() {
            return Err(ResolutionError::new(raw, "secret path is empty"));
        }

        Ok((mount_point, rest, explicit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults(grammar: TemplateGrammar, environment: Option<&str>) -> ResolverDefaults {
        ResolverDefaults {
            trigger: "VAULT:".to_string(),
            delimiter: "changeme".to_string(),
            mount_point: "secret".to_string(),
            base_path: "secret/helm".to_string(),
            project: "my-app".to_string(),
            environment: environment.map(str::to_string),
            grammar,
        }
    }

    fn resolved(resolution: Resolution) -> Coordinate {
        match resolution {
            Resolution::Resolved(coordinate) => coordinate,
            Resolution::NotAPlaceholder => panic!("expected a coordinate"),
        }
    }

    #[test]
    fn test_tokenize_accepts_trigger_with_or_without_colon() {
        assert_eq!(tokenize("VAULT:/a/b:k", "VAULT:"), Some(vec!["/a/b", "k"]));
        assert_eq!(tokenize("VAULT:/a/b:k", "VAULT"), Some(vec!["/a/b", "k"]));
        assert_eq!(tokenize("VAULTED", "VAULT"), None);
        assert_eq!(tokenize("plain", "VAULT:"), None);
    }

    #[test]
    fn test_not_a_placeholder() {
        let defaults = defaults(TemplateGrammar::PathKey, None);
        let resolver = CoordinateResolver::new(&defaults);
        assert_eq!(
            resolver.resolve_read("just a value").unwrap(),
            Resolution::NotAPlaceholder
        );
        assert_eq!(
            resolver.resolve_read("changeme").unwrap(),
            Resolution::NotAPlaceholder
        );
    }

    #[test]
    fn test_mount_extraction_from_absolute_path() {
        let defaults = defaults(TemplateGrammar::PathKey, None);
        let resolver = CoordinateResolver::new(&defaults);

        let coordinate = resolved(resolver.resolve_read("VAULT:/customMount/a/b").unwrap());
        assert_eq!(coordinate.mount_point, "customMount");
        assert_eq!(coordinate.secret_path, "a/b");
        assert!(coordinate.explicit_mount);
        assert_eq!(coordinate.flat_path(), "customMount/a/b");
    }

    #[test]
    fn test_relative_path_uses_default_mount() {
        let defaults = defaults(TemplateGrammar::PathKey, None);
        let resolver = CoordinateResolver::new(&defaults);

        let coordinate = resolved(resolver.resolve_read("VAULT:a/b").unwrap());
        assert_eq!(coordinate.mount_point, "secret");
        assert_eq!(coordinate.secret_path, "a/b");
        assert!(!coordinate.explicit_mount);
        assert_eq!(coordinate.flat_path(), "a/b");
    }

    #[test]
    fn test_key_defaults_to_sentinel() {
        let defaults = defaults(TemplateGrammar::PathKey, None);
        let resolver = CoordinateResolver::new(&defaults);

        let coordinate = resolved(resolver.resolve_read("VAULT:/secret/hello").unwrap());
        assert_eq!(coordinate.field_key, FieldKey::Sentinel);
        assert_eq!(coordinate.field_key.as_str(), "value");
    }

    #[test]
    fn test_dotted_key_is_kept() {
        let defaults = defaults(TemplateGrammar::PathKey, None);
        let resolver = CoordinateResolver::new(&defaults);

        let coordinate =
            resolved(resolver.resolve_read("VAULT:/secret/hello:custom.key").unwrap());
        assert_eq!(coordinate.mount_point, "secret");
        assert_eq!(coordinate.secret_path, "hello");
        assert_eq!(
            coordinate.field_key,
            FieldKey::Named("custom.key".to_string())
        );
    }

    #[test]
    fn test_extra_segments_join_into_key() {
        let defaults = defaults(TemplateGrammar::PathKey, None);
        let resolver = CoordinateResolver::new(&defaults);

        let coordinate = resolved(resolver.resolve_read("VAULT:/secret/urls:http://x").unwrap());
        assert_eq!(coordinate.field_key.as_str(), "http://x");
    }

    #[test]
    fn test_environment_token_without_environment() {
        let defaults = defaults(TemplateGrammar::PathKey, None);
        let resolver = CoordinateResolver::new(&defaults);

        let coordinate =
            resolved(resolver.resolve_read("VAULT:/secret/app{environment}/db:pw").unwrap());
        assert_eq!(coordinate.secret_path, "app/db");
    }

    #[test]
    fn test_environment_token_with_environment() {
        let defaults = defaults(TemplateGrammar::PathKey, Some("prod"));
        let resolver = CoordinateResolver::new(&defaults);

        let coordinate =
            resolved(resolver.resolve_read("VAULT:/secret/app{environment}/db:pw").unwrap());
        assert_eq!(coordinate.secret_path, "app/prod/db");

        let untouched = resolved(resolver.resolve_read("VAULT:/secret/app/db:pw").unwrap());
        assert_eq!(untouched.secret_path, "app/db");
    }

    #[test]
    fn test_empty_path_after_mount_is_an_error() {
        let defaults = defaults(TemplateGrammar::PathKey, None);
        let resolver = CoordinateResolver::new(&defaults);

        let err = resolver.resolve_read("VAULT:/secret").unwrap_err();
        assert!(err.reason.contains("empty"));
        assert!(resolver.resolve_read("VAULT:/secret/:key").is_err());
        assert!(resolver.resolve_read("VAULT:").is_err());
        assert!(resolver.resolve_read("VAULT:/").is_err());
    }

    #[test]
    fn test_legacy_grammar_mount_override() {
        let defaults = defaults(TemplateGrammar::PathMountKey, None);
        let resolver = CoordinateResolver::new(&defaults);

        let coordinate = resolved(resolver.resolve_read("VAULT:app/db:kv:password").unwrap());
        assert_eq!(coordinate.mount_point, "kv");
        assert_eq!(coordinate.secret_path, "app/db");
        assert_eq!(coordinate.field_key.as_str(), "password");
        assert_eq!(coordinate.flat_path(), "kv/app/db");

        let two = resolved(resolver.resolve_read("VAULT:app/db:password").unwrap());
        assert_eq!(two.mount_point, "secret");
        assert_eq!(two.field_key.as_str(), "password");
        assert_eq!(two.flat_path(), "app/db");

        let empty_override = resolved(resolver.resolve_read("VAULT:/other/app::pw").unwrap());
        assert_eq!(empty_override.mount_point, "other");
        assert_eq!(empty_override.field_key.as_str(), "pw");
    }

    #[test]
    fn test_positional_coordinate() {
        let defaults = defaults(TemplateGrammar::PathKey, None);
        let resolver = CoordinateResolver::new(&defaults);
        let ancestors = vec!["db".to_string(), "auth".to_string()];

        let coordinate =
            resolved(resolver.resolve_write("changeme", &ancestors, Some("password")).unwrap());
        assert_eq!(coordinate.mount_point, "secret");
        assert_eq!(coordinate.secret_path, "secret/helm/my-app/db/auth/password");
        assert_eq!(coordinate.field_key, FieldKey::Sentinel);
    }

    #[test]
    fn test_positional_coordinate_with_environment_and_absolute_base() {
        let mut defaults = defaults(TemplateGrammar::PathKey, Some("prod"));
        defaults.base_path = "/kv/helm".to_string();
        let resolver = CoordinateResolver::new(&defaults);

        let coordinate = resolved(resolver.resolve_write("changeme", &[], Some("token")).unwrap());
        assert_eq!(coordinate.mount_point, "kv");
        assert_eq!(coordinate.secret_path, "helm/my-app/prod/token");
    }

    #[test]
    fn test_positional_requires_mapping_key() {
        let defaults = defaults(TemplateGrammar::PathKey, None);
        let resolver = CoordinateResolver::new(&defaults);
        assert!(resolver.resolve_write("changeme", &[], None).is_err());
    }

    #[test]
    fn test_write_mode_accepts_templates() {
        let defaults = defaults(TemplateGrammar::PathKey, None);
        let resolver = CoordinateResolver::new(&defaults);

        let coordinate =
            resolved(resolver.resolve_write("VAULT:/secret/hello:value", &[], Some("k")).unwrap());
        assert_eq!(coordinate.secret_path, "hello");
        assert_eq!(
            resolver.resolve_write("other", &[], Some("k")).unwrap(),
            Resolution::NotAPlaceholder
        );
    }

    #[test]
    fn test_placeholder_rendering_resolves_back() {
        let defaults = defaults(TemplateGrammar::PathKey, None);
        let resolver = CoordinateResolver::new(&defaults);

        let relative =
            resolved(resolver.resolve_write("changeme", &["db".to_string()], Some("pw")).unwrap());
        assert_eq!(
            relative.to_placeholder("VAULT:"),
            "VAULT:secret/helm/my-app/db/pw:value"
        );

        let absolute = Coordinate {
            explicit_mount: true,
            ..relative.clone()
        };
        let placeholder = absolute.to_placeholder("VAULT");
        assert_eq!(placeholder, "VAULT:/secret/secret/helm/my-app/db/pw:value");

        for (coordinate, text) in [
            (&relative, relative.to_placeholder("VAULT:")),
            (&absolute, placeholder),
        ] {
            let back = resolved(resolver.resolve_read(&text).unwrap());
            assert_eq!(back.mount_point, coordinate.mount_point);
            assert_eq!(back.secret_path, coordinate.secret_path);
            assert_eq!(back.explicit_mount, coordinate.explicit_mount);
            assert_eq!(back.field_key.as_str(), "value");
        }
    }
}
