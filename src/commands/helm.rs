use crate::config::{Settings, VaultArgs, detect_project};
use crate::context::Context;
use crate::secrets::{KvVersion, SecretStore};
use crate::session::{Session, connect_store};
use anyhow::{Result, bail};
use clap::{Args, CommandFactory, Parser};
use std::fmt;
use std::path::Path;

/// Helm subcommands that take a decoded values file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelmAction {
    Install,
    Template,
    Upgrade,
    Lint,
    Diff,
}

impl HelmAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HelmAction::Install => "install",
            HelmAction::Template => "template",
            HelmAction::Upgrade => "upgrade",
            HelmAction::Lint => "lint",
            HelmAction::Diff => "diff",
        }
    }
}

impl fmt::Display for HelmAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments shared by the helm wrappers
#[derive(Args, Debug, Clone)]
pub struct HelmArgs {
    /// The templated YAML file to decode on the fly
    #[arg(short = 'f', long = "values")]
    pub values: Option<String>,

    #[command(flatten)]
    pub vault: VaultArgs,

    /// Arguments passed to helm unchanged
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub helm_args: Vec<String>,
}

/// Helm wrapper arguments once the options mixed into the pass-through list
/// have been picked out
#[derive(Debug, Clone)]
pub struct HelmInvocation {
    pub vault: VaultArgs,
    pub values: Option<String>,
    pub helm_args: Vec<String>,
}

impl HelmArgs {
    /// Separate helm-vault options from the arguments meant for helm.
    ///
    /// Anything after the first helm positional (usually the release name)
    /// lands in the pass-through list, so `-f/--values` and the Vault options
    /// are looked for there as well. An option given there wins over the same
    /// option given before the release name.
    pub fn split(&self) -> Result<HelmInvocation> {
        let (found, rest) = extract_values_file(&self.helm_args);
        let (flags, helm_args) = extract_vault_flags(&rest);

        let mut vault = self.vault.clone();
        if !flags.is_empty() {
            TrailingVaultArgs::try_parse_from(&flags)?.apply_to(&mut vault);
        }

        Ok(HelmInvocation {
            vault,
            values: self.values.clone().or(found),
            helm_args,
        })
    }
}

/// The Vault options, without environment variables or defaults, so only
/// what was actually typed is applied
#[derive(Parser, Debug)]
#[command(no_binary_name = true, args_override_self = true)]
struct TrailingVaultArgs {
    #[arg(long = "vaulttemplate")]
    secret_template: Option<String>,

    #[arg(short = 'd', long = "deliminator")]
    deliminator: Option<String>,

    #[arg(long = "mountpoint")]
    mount_point: Option<String>,

    #[arg(long = "vaultpath")]
    vault_path: Option<String>,

    #[arg(long = "kvversion", value_enum)]
    kv_version: Option<KvVersion>,

    #[arg(short, long)]
    environment: Option<String>,

    #[arg(long)]
    project: Option<String>,

    #[arg(short, long)]
    verbose: bool,

    #[arg(long = "vault-addr")]
    vault_addr: Option<String>,

    #[arg(long = "vault-token")]
    vault_token: Option<String>,

    #[arg(long = "vault-namespace")]
    vault_namespace: Option<String>,
}

impl TrailingVaultArgs {
    fn apply_to(self, vault: &mut VaultArgs) {
        fn set<T>(target: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *target = value;
            }
        }

        set(&mut vault.secret_template, self.secret_template);
        set(&mut vault.deliminator, self.deliminator);
        set(&mut vault.mount_point, self.mount_point);
        set(&mut vault.vault_path, self.vault_path);
        set(&mut vault.kv_version, self.kv_version);
        set(&mut vault.environment, self.environment.map(Some));
        set(&mut vault.project, self.project.map(Some));
        set(&mut vault.vault_addr, self.vault_addr.map(Some));
        set(&mut vault.vault_token, self.vault_token.map(Some));
        set(&mut vault.vault_namespace, self.vault_namespace.map(Some));
        vault.verbose |= self.verbose;
    }
}

fn extract_values_file(args: &[String]) -> (Option<String>, Vec<String>) {
    let mut values = None;
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if values.is_none() {
            if arg == "-f" || arg == "--values" {
                if let Some(file) = iter.next() {
                    values = Some(file.clone());
                    continue;
                }
            } else if let Some(file) = arg
                .strip_prefix("--values=")
                .or_else(|| arg.strip_prefix("-f="))
            {
                values = Some(file.to_string());
                continue;
            }
        }
        rest.push(arg.clone());
    }

    (values, rest)
}

/// Split `args` into the Vault options (with their values) and the rest
fn extract_vault_flags(args: &[String]) -> (Vec<String>, Vec<String>) {
    let command = TrailingVaultArgs::command();
    let mut flags = Vec::new();
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        // Everything after `--` belongs to helm
        if arg == "--" {
            rest.push(arg.clone());
            rest.extend(iter.by_ref().cloned());
            break;
        }

        let (name, inline_value) = match arg.split_once('=') {
            Some((name, _)) => (name, true),
            None => (arg.as_str(), false),
        };

        match command.get_arguments().find(|known| names_flag(known, name)) {
            Some(known) => {
                flags.push(arg.clone());
                if !inline_value && known.get_action().takes_values() {
                    if let Some(value) = iter.next() {
                        flags.push(value.clone());
                    }
                }
            }
            None => rest.push(arg.clone()),
        }
    }

    (flags, rest)
}

fn names_flag(arg: &clap::Arg, token: &str) -> bool {
    if let Some(long) = token.strip_prefix("--") {
        return !long.is_empty() && arg.get_long() == Some(long);
    }

    let mut short = match token.strip_prefix('-') {
        Some(short) => short.chars(),
        None => return false,
    };
    match (short.next(), short.next()) {
        (Some(c), None) => arg.get_short() == Some(c),
        _ => false,
    }
}

/// Handles the helm wrappers - decode, run helm, clean up
pub struct HelmCommand;

impl HelmCommand {
    /// Execute a helm wrapper
    pub fn execute(
        ctx: &Context,
        settings: &Settings,
        action: HelmAction,
        yaml_file: Option<&str>,
        helm_args: &[String],
    ) -> Result<()> {
        settings.describe(&*ctx.output);

        let Some(yaml_file) = yaml_file else {
            bail!("No values file given. Pass the templated file with -f/--values.");
        };

        let session = Session::load(ctx, settings, Path::new(yaml_file))?;
        let store = connect_store(settings)?;

        Self::run(ctx, settings, session, &store, action, helm_args)
    }

    /// Resolve, hand the working file to helm and always clean up afterwards
    pub fn run(
        ctx: &Context,
        settings: &Settings,
        mut session: Session<'_>,
        store: &SecretStore,
        action: HelmAction,
        helm_args: &[String],
    ) -> Result<()> {
        let defaults = settings.resolver_defaults(detect_project(ctx, settings));
        let report = session.resolve_from_store(store, &defaults)?;

        if let Err(e) = report.into_result() {
            session.cleanup()?;
            return Err(e.into());
        }

        session.materialize()?;

        let mut args = vec![action.as_str().to_string()];
        args.extend(helm_args.iter().cloned());
        let dispatched = session.dispatch("helm", &args);

        session.cleanup()?;

        match dispatched? {
            0 => ctx.output.success(&format!("helm {} finished", action)),
            code => ctx
                .output
                .warning(&format!("helm {} exited with status {}", action, code)),
        }
        Ok(())
    }
}
