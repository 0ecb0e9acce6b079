//! Session orchestration.
//!
//! A session owns one document for the duration of a command. It moves through
//! `Idle -> Loaded -> Resolving -> Materialized -> (Dispatched | Cleaned)`,
//! wiring the walker, the coordinate resolver and the secret store together.

use crate::config::Settings;
use crate::context::Context;
use crate::coordinate::{CoordinateResolver, Resolution, ResolverDefaults};
use crate::document::{
    self, Entry, NodeVisitor, OutcomeStatus, Visit, WalkReport, Walker, write_working_file,
};
use crate::error::HelmVaultError;
use crate::secrets::{ReqwestTransport, SecretStore};
use crate::traits::{FileSystem, UserInput};
use anyhow::{Result, bail};
use lazy_static::lazy_static;
use regex::Regex;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

lazy_static! {
    static ref SECRET_FILE_NAME: Regex = Regex::new(r"\.yaml\.dec$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loaded,
    Resolving,
    Materialized,
    Dispatched,
    Cleaned,
}

impl SessionState {
    fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Loaded)
                | (Loaded, Resolving)
                | (Resolving, Materialized)
                | (Resolving, Cleaned)
                | (Materialized, Dispatched)
                | (Materialized, Cleaned)
                | (Dispatched, Cleaned)
        )
    }
}

/// Build the HTTP transport and verify the token.
///
/// Missing address or token, and an unreachable store, fail here before any
/// traversal.
pub fn connect_store(settings: &Settings) -> Result<SecretStore, HelmVaultError> {
    let transport = ReqwestTransport::new(
        settings.vault_addr.as_deref(),
        settings.vault_token.as_deref(),
        settings.vault_namespace.as_deref(),
    )?;
    Ok(SecretStore::connect(settings.kv_version, Arc::new(transport))?)
}

/// One document being resolved or pushed
pub struct Session<'a> {
    ctx: &'a Context,
    settings: &'a Settings,
    source: PathBuf,
    document: Value,
    state: SessionState,
    working_file: Option<PathBuf>,
}

impl<'a> Session<'a> {
    /// Parse the source document. A parse failure ends the session before the
    /// store is contacted.
    pub fn load(ctx: &'a Context, settings: &'a Settings, source: &Path) -> Result<Self> {
        let document = document::load_document(&*ctx.fs, source)?;

        let mut session = Self {
            ctx,
            settings,
            source: source.to_path_buf(),
            document,
            state: SessionState::Idle,
            working_file: None,
        };
        session.advance(SessionState::Loaded)?;
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    fn ensure_can_advance(&self, next: SessionState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            bail!(
                "Invalid session transition from {:?} to {:?}",
                self.state,
                next
            );
        }
        Ok(())
    }

    fn advance(&mut self, next: SessionState) -> Result<()> {
        self.ensure_can_advance(next)?;
        if self.settings.verbose {
            self.ctx
                .output
                .dimmed(&format!("Session: {:?} -> {:?}", self.state, next));
        }
        self.state = next;
        Ok(())
    }

    /// Replace every placeholder with its value from the store
    pub fn resolve_from_store(
        &mut self,
        store: &SecretStore,
        defaults: &ResolverDefaults,
    ) -> Result<WalkReport> {
        self.advance(SessionState::Resolving)?;

        let mut visitor = DecodeVisitor {
            resolver: CoordinateResolver::new(defaults),
            store,
            halted: None,
        };
        let report = Walker::traverse(&mut self.document, &mut visitor);
        self.report_outcomes(&report, false);
        Ok(report)
    }

    /// Write a value for every placeholder into the store
    pub fn populate_store(
        &mut self,
        store: &SecretStore,
        defaults: &ResolverDefaults,
        source: &dyn ValueSource,
    ) -> Result<WalkReport> {
        self.advance(SessionState::Resolving)?;

        let mut visitor = EncodeVisitor {
            resolver: CoordinateResolver::new(defaults),
            store,
            source,
            halted: None,
        };
        let report = Walker::traverse(&mut self.document, &mut visitor);
        self.report_outcomes(&report, true);
        Ok(report)
    }

    /// Write the resolved document to `<source>[.<environment>].dec`
    pub fn materialize(&mut self) -> Result<PathBuf> {
        self.ensure_can_advance(SessionState::Materialized)?;
        let target = write_working_file(
            &*self.ctx.fs,
            &self.source,
            self.settings.environment.as_deref(),
            &self.document,
        )?;
        self.advance(SessionState::Materialized)?;

        if self.settings.verbose {
            self.ctx
                .output
                .dimmed(&format!("Wrote {}", target.display()));
        }
        self.working_file = Some(target.clone());
        Ok(target)
    }

    /// Render the resolved document without touching the disk
    pub fn render(&self) -> Result<String> {
        Ok(document::render_document(&self.document)?)
    }

    /// Hand the working file to an external command.
    ///
    /// The exit code is returned for reporting only.
    pub fn dispatch(&mut self, command: &str, args: &[String]) -> Result<i32> {
        let Some(working_file) = self.working_file.clone() else {
            bail!("No working file to hand to {}", command);
        };

        let file_arg = working_file.to_string_lossy().to_string();
        let mut full_args: Vec<&str> = args.iter().map(String::as_str).collect();
        full_args.push("-f");
        full_args.push(&file_arg);

        if self.settings.verbose {
            self.ctx.output.dimmed(&format!(
                "About to execute command: {} {}",
                command,
                full_args.join(" ")
            ));
        }

        let code = self
            .ctx
            .command
            .execute_interactive(command, &full_args, &self.ctx.working_dir);
        self.advance(SessionState::Dispatched)?;
        code
    }

    /// Remove the working file, if one was written
    pub fn cleanup(&mut self) -> Result<()> {
        if let Some(working_file) = self.working_file.take() {
            if self.ctx.fs.exists(&working_file) {
                self.ctx.fs.remove_file(&working_file)?;
            }
            if self.settings.verbose {
                self.ctx
                    .output
                    .dimmed(&format!("Deleted {}", working_file.display()));
            }
        }
        self.advance(SessionState::Cleaned)
    }

    fn report_outcomes(&self, report: &WalkReport, announce_placeholders: bool) {
        for outcome in &report.outcomes {
            match &outcome.status {
                OutcomeStatus::Replaced(detail) => {
                    if announce_placeholders {
                        self.ctx.output.key_value(&outcome.location, detail);
                    } else if self.settings.verbose {
                        self.ctx
                            .output
                            .dimmed(&format!("Done {} <- {}", outcome.location, detail));
                    }
                }
                OutcomeStatus::Failed(err) => {
                    self.ctx.output.error(&err.to_string());
                }
            }
        }
    }
}

/// Where `enc` takes the value for a placeholder from
pub trait ValueSource {
    fn value_for(&self, entry: &Entry<'_>) -> Result<Value, HelmVaultError>;
}

/// Values from a companion `*.yaml.dec` file laid out like the document
pub struct SecretFileSource {
    name: String,
    document: Value,
}

impl SecretFileSource {
    /// Load a companion secret file. Its name must end in `.yaml.dec`.
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Self, HelmVaultError> {
        let name = path.display().to_string();
        if !SECRET_FILE_NAME.is_match(&name) {
            return Err(HelmVaultError::SecretFile(format!(
                "Secret file name must end with \".yaml.dec\". {} was given instead.",
                name
            )));
        }

        let document = document::load_document(fs, path)?;
        Ok(Self { name, document })
    }
}

impl ValueSource for SecretFileSource {
    fn value_for(&self, entry: &Entry<'_>) -> Result<Value, HelmVaultError> {
        let missing = || {
            HelmVaultError::SecretFile(format!(
                "no value for {} in {}",
                entry.location(),
                self.name
            ))
        };

        let key = entry.key.ok_or_else(missing)?;
        let mut node = &self.document;
        for segment in entry.ancestors.segments().iter().map(String::as_str).chain([key]) {
            node = child(node, segment).ok_or_else(missing)?;
        }

        match node {
            Value::Mapping(_) | Value::Sequence(_) => Err(missing()),
            scalar => Ok(scalar.clone()),
        }
    }
}

/// Mapping entry whose key renders as `segment`, so `8080:` or `true:` keys
/// match the tree path the walker built for them
fn child<'v>(node: &'v Value, segment: &str) -> Option<&'v Value> {
    node.as_mapping()?
        .iter()
        .find(|(key, _)| document::key_segment(key) == segment)
        .map(|(_, value)| value)
}

/// Values typed in at a hidden prompt
pub struct PromptSource<'a> {
    input: &'a dyn UserInput,
}

impl<'a> PromptSource<'a> {
    pub fn new(input: &'a dyn UserInput) -> Self {
        Self { input }
    }
}

impl ValueSource for PromptSource<'_> {
    fn value_for(&self, entry: &Entry<'_>) -> Result<Value, HelmVaultError> {
        let location = entry.location();
        self.input
            .secret(&format!("Input a value for {}:", location))
            .map(Value::String)
            .map_err(|e| HelmVaultError::Resolution {
                location,
                message: format!("{:#}", e),
            })
    }
}

fn skipped(location: &str, cause: &str) -> Visit {
    Visit::Fail(HelmVaultError::Transport(format!(
        "skipped {} after earlier failure: {}",
        location, cause
    )))
}

/// Reads placeholders from the store into the document
struct DecodeVisitor<'a> {
    resolver: CoordinateResolver<'a>,
    store: &'a SecretStore,
    /// Set after the first transport error; later lookups are not attempted
    halted: Option<String>,
}

impl NodeVisitor for DecodeVisitor<'_> {
    fn visit(&mut self, entry: &Entry<'_>, value: &Value) -> Visit {
        let Some(raw) = value.as_str() else {
            return Visit::Skip;
        };
        let location = entry.location();

        let coordinate = match self.resolver.resolve_read(raw) {
            Ok(Resolution::Resolved(coordinate)) => coordinate,
            Ok(Resolution::NotAPlaceholder) => return Visit::Skip,
            Err(e) => return Visit::Fail(HelmVaultError::resolution(&location, e)),
        };

        if let Some(cause) = &self.halted {
            return skipped(&location, cause);
        }

        match self.store.lookup(&coordinate) {
            Ok(secret) => match secret.into_yaml() {
                Ok(value) => Visit::Replace {
                    value,
                    detail: coordinate.to_string(),
                },
                Err(e) => Visit::Fail(HelmVaultError::Resolution {
                    location,
                    message: e.to_string(),
                }),
            },
            Err(e) => {
                let err = HelmVaultError::from_store(&location, e);
                if err.is_transport() {
                    self.halted = Some(err.to_string());
                }
                Visit::Fail(err)
            }
        }
    }
}

/// Pushes sourced values into the store
struct EncodeVisitor<'a> {
    resolver: CoordinateResolver<'a>,
    store: &'a SecretStore,
    source: &'a dyn ValueSource,
    halted: Option<String>,
}

impl NodeVisitor for EncodeVisitor<'_> {
    fn visit(&mut self, entry: &Entry<'_>, value: &Value) -> Visit {
        let Some(raw) = value.as_str() else {
            return Visit::Skip;
        };
        let location = entry.location();

        let coordinate = match self
            .resolver
            .resolve_write(raw, entry.ancestors.segments(), entry.key)
        {
            Ok(Resolution::Resolved(coordinate)) => coordinate,
            Ok(Resolution::NotAPlaceholder) => return Visit::Skip,
            Err(e) => return Visit::Fail(HelmVaultError::resolution(&location, e)),
        };

        if let Some(cause) = &self.halted {
            return skipped(&location, cause);
        }

        let secret = match self.source.value_for(entry) {
            Ok(secret) => secret,
            Err(e) => return Visit::Fail(e),
        };

        let payload = match serde_json::to_value(&secret) {
            Ok(payload) => payload,
            Err(e) => {
                return Visit::Fail(HelmVaultError::Resolution {
                    location,
                    message: e.to_string(),
                });
            }
        };

        match self.store.store(&coordinate, payload) {
            Ok(()) => Visit::Replace {
                value: secret,
                detail: self
                    .store
                    .placeholder(&coordinate, &self.resolver.defaults().trigger),
            },
            Err(e) => {
                let err = HelmVaultError::from_store(&location, e);
                if err.is_transport() {
                    self.halted = Some(err.to_string());
                }
                Visit::Fail(err)
            }
        }
    }
}
