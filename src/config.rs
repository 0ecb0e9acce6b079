//! Runtime configuration.
//!
//! Every option is taken from the command line, then from its environment
//! variable, then from a default. The resulting `Settings` is built once in
//! `main` and passed down by reference.

use crate::context::Context;
use crate::coordinate::{ResolverDefaults, TemplateGrammar};
use crate::secrets::KvVersion;
use crate::traits::Output;
use clap::Args;
use std::path::Path;

pub const DEFAULT_TEMPLATE: &str = "VAULT:";
pub const DEFAULT_DELIMINATOR: &str = "changeme";
pub const DEFAULT_MOUNT_POINT: &str = "secret";
pub const DEFAULT_VAULT_PATH: &str = "secret/helm";

#[cfg(windows)]
pub const DEFAULT_EDITOR: &str = "notepad";
#[cfg(not(windows))]
pub const DEFAULT_EDITOR: &str = "vi";

/// Options shared by every command that talks to Vault
#[derive(Args, Debug, Clone)]
pub struct VaultArgs {
    /// Prefix marking a value to be looked up in Vault
    #[arg(long = "vaulttemplate", env = "SECRET_TEMPLATE", default_value = DEFAULT_TEMPLATE)]
    pub secret_template: String,

    /// Value marking a secret to be stored by position (enc)
    #[arg(
        short = 'd',
        long = "deliminator",
        env = "SECRET_DELIM",
        default_value = DEFAULT_DELIMINATOR
    )]
    pub deliminator: String,

    /// Vault mount point used when a path does not name one
    #[arg(long = "mountpoint", env = "VAULT_MOUNT_POINT", default_value = DEFAULT_MOUNT_POINT)]
    pub mount_point: String,

    /// Base path for secrets stored by position (enc)
    #[arg(long = "vaultpath", env = "VAULT_PATH", default_value = DEFAULT_VAULT_PATH)]
    pub vault_path: String,

    /// KV secrets engine version
    #[arg(long = "kvversion", env = "KVVERSION", value_enum, default_value_t = KvVersion::V2)]
    pub kv_version: KvVersion,

    /// Environment whose secrets to use
    #[arg(short, long)]
    pub environment: Option<String>,

    /// Project name used in positional secret paths (defaults to the git repository name)
    #[arg(long)]
    pub project: Option<String>,

    /// Verbose logs
    #[arg(short, long)]
    pub verbose: bool,

    /// Vault address, e.g. http://localhost:8200
    #[arg(long = "vault-addr", env = "VAULT_ADDR", hide_env_values = true)]
    pub vault_addr: Option<String>,

    /// Token used to authenticate with Vault
    #[arg(long = "vault-token", env = "VAULT_TOKEN", hide_env_values = true)]
    pub vault_token: Option<String>,

    /// Vault Enterprise namespace
    #[arg(long = "vault-namespace", env = "VAULT_NAMESPACE")]
    pub vault_namespace: Option<String>,
}

/// Configuration for one session
#[derive(Debug, Clone)]
pub struct Settings {
    pub vault_addr: Option<String>,
    pub vault_token: Option<String>,
    pub vault_namespace: Option<String>,
    pub mount_point: String,
    pub secret_template: String,
    pub deliminator: String,
    pub vault_path: String,
    pub kv_version: KvVersion,
    pub environment: Option<String>,
    pub project: Option<String>,
    pub editor: String,
    pub verbose: bool,
}

impl Settings {
    pub fn from_args(args: &VaultArgs, editor: Option<String>) -> Self {
        Self {
            vault_addr: args.vault_addr.clone(),
            vault_token: args.vault_token.clone(),
            vault_namespace: args.vault_namespace.clone(),
            mount_point: args.mount_point.clone(),
            secret_template: args.secret_template.clone(),
            deliminator: args.deliminator.clone(),
            vault_path: args.vault_path.clone(),
            kv_version: args.kv_version,
            environment: args.environment.clone().filter(|e| !e.is_empty()),
            project: args.project.clone().filter(|p| !p.is_empty()),
            editor: editor.unwrap_or_else(|| DEFAULT_EDITOR.to_string()),
            verbose: args.verbose,
        }
    }

    /// Placeholder grammar matching the KV version
    pub fn grammar(&self) -> TemplateGrammar {
        match self.kv_version {
            KvVersion::V1 => TemplateGrammar::PathMountKey,
            KvVersion::V2 => TemplateGrammar::PathKey,
        }
    }

    pub fn resolver_defaults(&self, project: String) -> ResolverDefaults {
        ResolverDefaults {
            trigger: self.secret_template.clone(),
            delimiter: self.deliminator.clone(),
            mount_point: self.mount_point.clone(),
            base_path: self.vault_path.clone(),
            project,
            environment: self.environment.clone(),
            grammar: self.grammar(),
        }
    }

    /// Print the settings in effect (verbose mode)
    pub fn describe(&self, output: &dyn Output) {
        if !self.verbose {
            return;
        }
        let unset = || "<unset>".to_string();
        output.dimmed(&format!(
            "Vault address: {}",
            self.vault_addr.clone().unwrap_or_else(unset)
        ));
        output.dimmed(&format!(
            "Vault token: {}",
            if self.vault_token.is_some() { "<set>" } else { "<unset>" }
        ));
        output.dimmed(&format!("KV version: {}", self.kv_version));
        output.dimmed(&format!("Mount point: {}", self.mount_point));
        output.dimmed(&format!("Secret template: {}", self.secret_template));
        output.dimmed(&format!("Deliminator: {}", self.deliminator));
        output.dimmed(&format!("Vault path: {}", self.vault_path));
        output.dimmed(&format!(
            "Environment: {}",
            self.environment.clone().unwrap_or_else(unset)
        ));
    }
}

/// Project identifier for positional coordinates: `--project`, else the
/// enclosing git repository name, else the working directory name.
pub fn detect_project(ctx: &Context, settings: &Settings) -> String {
    if let Some(project) = &settings.project {
        return project.clone();
    }

    let from_git = ctx
        .command
        .capture("git", &["rev-parse", "--show-toplevel"], &ctx.working_dir)
        .and_then(|top| dir_name(Path::new(&top)));

    from_git
        .or_else(|| dir_name(&ctx.working_dir))
        .unwrap_or_default()
}

fn dir_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
pub(crate) fn test_settings(kv_version: KvVersion) -> Settings {
    Settings {
        vault_addr: Some("http://127.0.0.1:8200".to_string()),
        vault_token: Some("root".to_string()),
        vault_namespace: None,
        mount_point: DEFAULT_MOUNT_POINT.to_string(),
        secret_template: DEFAULT_TEMPLATE.to_string(),
        deliminator: DEFAULT_DELIMINATOR.to_string(),
        vault_path: DEFAULT_VAULT_PATH.to_string(),
        kv_version,
        environment: None,
        project: Some("my-app".to_string()),
        editor: DEFAULT_EDITOR.to_string(),
        verbose: false,
    }
}
