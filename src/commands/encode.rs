use crate::config::{Settings, detect_project};
use crate::context::Context;
use crate::secrets::SecretStore;
use crate::session::{PromptSource, SecretFileSource, Session, ValueSource, connect_store};
use anyhow::Result;
use std::path::Path;

/// Handles the 'enc' command - pushes values for every placeholder into Vault
pub struct EncodeCommand;

impl EncodeCommand {
    /// Execute the enc command
    pub fn execute(
        ctx: &Context,
        settings: &Settings,
        yaml_file: &str,
        secret_file: Option<&str>,
    ) -> Result<()> {
        settings.describe(&*ctx.output);

        let session = Session::load(ctx, settings, Path::new(yaml_file))?;
        let secrets = secret_file
            .map(|file| SecretFileSource::load(&*ctx.fs, Path::new(file)))
            .transpose()?;
        let store = connect_store(settings)?;

        Self::run(ctx, settings, session, &store, secrets.as_ref())
    }

    /// Populate a connected store from a loaded session.
    ///
    /// Values come from `secrets` when given, otherwise from a hidden prompt.
    pub fn run(
        ctx: &Context,
        settings: &Settings,
        mut session: Session<'_>,
        store: &SecretStore,
        secrets: Option<&SecretFileSource>,
    ) -> Result<()> {
        let defaults = settings.resolver_defaults(detect_project(ctx, settings));
        let prompt = PromptSource::new(&*ctx.input);
        let source: &dyn ValueSource = match secrets {
            Some(secrets) => secrets,
            None => &prompt,
        };

        ctx.output.section("Stored secrets");
        let report = session.populate_store(store, &defaults, source)?;
        let stored = report.total() - report.failure_count();
        let report = report.into_result()?;

        if report.total() == 0 {
            ctx.output.info("No placeholders found");
        } else {
            ctx.output
                .success(&format!("Stored {} secret(s) in Vault", stored));
        }
        Ok(())
    }
}
