use crate::config::{Settings, detect_project};
use crate::context::Context;
use crate::secrets::SecretStore;
use crate::session::{Session, connect_store};
use anyhow::{Context as AnyhowContext, Result, bail};
use std::path::Path;

/// What to do with the resolved document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Write the working file next to the source
    Write,
    /// Print the resolved document, write nothing
    View,
    /// Write the working file and open it in the editor
    Edit,
}

/// Handles the 'dec', 'view' and 'edit' commands
pub struct DecodeCommand;

impl DecodeCommand {
    /// Execute a decode-family command
    pub fn execute(
        ctx: &Context,
        settings: &Settings,
        yaml_file: &str,
        mode: DecodeMode,
    ) -> Result<()> {
        settings.describe(&*ctx.output);

        let session = Session::load(ctx, settings, Path::new(yaml_file))?;
        let store = connect_store(settings)?;

        Self::run(ctx, settings, session, &store, mode)
    }

    /// Resolve a loaded session against a connected store
    pub fn run(
        ctx: &Context,
        settings: &Settings,
        mut session: Session<'_>,
        store: &SecretStore,
        mode: DecodeMode,
    ) -> Result<()> {
        let defaults = settings.resolver_defaults(detect_project(ctx, settings));
        let report = session.resolve_from_store(store, &defaults)?;

        match mode {
            DecodeMode::View => {
                ctx.output.plain(&session.render()?);
                report.into_result()?;
            }
            DecodeMode::Write => {
                let working_file = session.materialize()?;
                report.into_result()?;
                ctx.output
                    .success(&format!("Decoded to {}", working_file.display()));
            }
            DecodeMode::Edit => {
                report.into_result()?;
                let working_file = session.materialize()?;
                Self::launch_editor(ctx, settings, &working_file)?;
            }
        }

        Ok(())
    }

    fn launch_editor(ctx: &Context, settings: &Settings, file: &Path) -> Result<()> {
        let mut parts = settings.editor.split_whitespace();
        let Some(program) = parts.next() else {
            bail!("No editor configured. Set EDITOR or pass --editor.");
        };

        let file_arg = file.to_string_lossy().to_string();
        let mut args: Vec<&str> = parts.collect();
        args.push(&file_arg);

        if settings.verbose {
            ctx.output
                .dimmed(&format!("About to execute command: {} {}", program, args.join(" ")));
        }

        let code = ctx
            .command
            .execute_interactive(program, &args, &ctx.working_dir)
            .with_context(|| format!("Failed to launch editor '{}'", program))?;

        if code != 0 {
            ctx.output
                .warning(&format!("Editor exited with status {}", code));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_settings;
    use crate::error::HelmVaultError;
    use crate::secrets::{KvVersion, MemoryTransport};
    use crate::traits::{
        FileSystem, MockCommandExecutor, MockFileSystem, MockOutput, MockUserInput,
    };
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn setup(
        document: &str,
    ) -> (Arc<MockFileSystem>, Arc<MockOutput>, Arc<MockCommandExecutor>, Context) {
        let fs = Arc::new(MockFileSystem::new());
        fs.write(Path::new("/work/values.yaml"), document).unwrap();
        let output = Arc::new(MockOutput::new());
        let command = Arc::new(MockCommandExecutor::new());
        let ctx = Context::test_with(
            fs.clone(),
            Arc::new(MockUserInput::new()),
            output.clone(),
            command.clone(),
        );
        (fs, output, command, ctx)
    }

    fn store(version: KvVersion) -> SecretStore {
        let transport = Arc::new(MemoryTransport::new(version));
        transport.seed("secret", "app/db", json!({"password": "hunter2", "user": "admin"}));
        SecretStore::connect(version, transport).unwrap()
    }

    #[test]
    fn test_dec_writes_working_file() {
        let (fs, output, _, ctx) = setup("db:\n  password: \"VAULT:/secret/app/db:password\"\n");
        let settings = test_settings(KvVersion::V2);
        let session = Session::load(&ctx, &settings, Path::new("/work/values.yaml")).unwrap();

        let vault = store(KvVersion::V2);
        DecodeCommand::run(&ctx, &settings, session, &vault, DecodeMode::Write).unwrap();

        assert_eq!(
            fs.get_file_contents(Path::new("/work/values.yaml.dec")).unwrap(),
            "db:\n  password: hunter2\n"
        );
        assert!(fs.has_file(Path::new("/work/values.yaml")));
        assert!(output.get_errors().is_empty());
    }

    #[test]
    fn test_dec_with_flat_store() {
        let (fs, _, _, ctx) = setup("user: \"VAULT:/secret/app/db:user\"\n");
        let settings = test_settings(KvVersion::V1);
        let session = Session::load(&ctx, &settings, Path::new("/work/values.yaml")).unwrap();

        let vault = store(KvVersion::V1);
        DecodeCommand::run(&ctx, &settings, session, &vault, DecodeMode::Write).unwrap();

        assert_eq!(
            fs.get_file_contents(Path::new("/work/values.yaml.dec")).unwrap(),
            "user: admin\n"
        );
    }

    #[test]
    fn test_dec_partial_failure_keeps_placeholder_and_fails() {
        let (fs, output, _, ctx) = setup(
            concat!(
                "missing: \"VAULT:/secret/app/nope:password\"\n",
                "found: \"VAULT:/secret/app/db:password\"\n",
            ),
        );
        let settings = test_settings(KvVersion::V2);
        let session = Session::load(&ctx, &settings, Path::new("/work/values.yaml")).unwrap();

        let vault = store(KvVersion::V2);
        let err = DecodeCommand::run(&ctx, &settings, session, &vault, DecodeMode::Write)
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<HelmVaultError>(),
            Some(HelmVaultError::PartialFailure { failed: 1, total: 2 })
        ));
        let written: serde_yaml::Value =
            serde_yaml::from_str(&fs.get_file_contents(Path::new("/work/values.yaml.dec")).unwrap())
                .unwrap();
        assert_eq!(written["missing"].as_str(), Some("VAULT:/secret/app/nope:password"));
        assert_eq!(written["found"].as_str(), Some("hunter2"));
        assert_eq!(output.get_errors().len(), 1);
    }

    #[test]
    fn test_view_prints_without_writing() {
        let (fs, output, _, ctx) = setup("password: \"VAULT:/secret/app/db:password\"\n");
        let settings = test_settings(KvVersion::V2);
        let session = Session::load(&ctx, &settings, Path::new("/work/values.yaml")).unwrap();

        let vault = store(KvVersion::V2);
        DecodeCommand::run(&ctx, &settings, session, &vault, DecodeMode::View).unwrap();

        assert_eq!(output.plain_text(), "password: hunter2\n");
        assert!(!fs.has_file(Path::new("/work/values.yaml.dec")));
    }

    #[test]
    fn test_edit_launches_editor_and_keeps_file() {
        let (fs, _, command, ctx) = setup("password: \"VAULT:/secret/app/db:password\"\n");
        let mut settings = test_settings(KvVersion::V2);
        settings.editor = "code --wait".to_string();
        settings.environment = Some("staging".to_string());
        let session = Session::load(&ctx, &settings, Path::new("/work/values.yaml")).unwrap();

        let vault = store(KvVersion::V2);
        DecodeCommand::run(&ctx, &settings, session, &vault, DecodeMode::Edit).unwrap();

        let working_file = PathBuf::from("/work/values.yaml.staging.dec");
        assert_eq!(
            command.calls(),
            vec![vec!["code", "--wait", "/work/values.yaml.staging.dec"]]
        );
        assert!(fs.has_file(&working_file));
    }
}
