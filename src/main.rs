mod commands;
mod config;
mod context;
mod coordinate;
mod document;
mod error;
mod output;
mod secrets;
mod session;
mod traits;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::helm::HelmArgs;
use commands::{CleanCommand, DecodeCommand, DecodeMode, EncodeCommand, HelmAction, HelmCommand};
use config::{Settings, VaultArgs};
use context::Context;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "helm-vault")]
#[command(
    about = "Store Helm chart secrets in HashiCorp Vault and decode them on the fly",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the secrets of a YAML file in Vault
    Enc {
        /// The YAML file to read placeholders from
        yaml_file: String,

        /// File holding the values to store, laid out like the YAML file (must end in .yaml.dec)
        #[arg(short = 's', long = "secret-file")]
        secret_file: Option<String>,

        #[command(flatten)]
        vault: VaultArgs,
    },

    /// Decode the secrets of a YAML file into <file>[.<environment>].dec
    Dec {
        /// The templated YAML file
        yaml_file: String,

        #[command(flatten)]
        vault: VaultArgs,
    },

    /// Print the decoded YAML file
    View {
        /// The templated YAML file
        yaml_file: String,

        #[command(flatten)]
        vault: VaultArgs,
    },

    /// Decode a YAML file and open the result in an editor
    Edit {
        /// The templated YAML file
        yaml_file: String,

        /// Editor to open the decoded file with
        #[arg(long, env = "EDITOR")]
        editor: Option<String>,

        #[command(flatten)]
        vault: VaultArgs,
    },

    /// Remove decoded working files
    Clean {
        /// The YAML file whose working file to remove (defaults to every .dec file here)
        #[arg(short = 'f', long = "file")]
        file: Option<String>,

        /// Environment of the working file to remove
        #[arg(short, long)]
        environment: Option<String>,

        /// Verbose logs
        #[arg(short, long)]
        verbose: bool,
    },

    /// Decode values, then run helm install
    Install(HelmArgs),

    /// Decode values, then run helm template
    Template(HelmArgs),

    /// Decode values, then run helm upgrade
    Upgrade(HelmArgs),

    /// Decode values, then run helm lint
    Lint(HelmArgs),

    /// Decode values, then run helm diff
    Diff(HelmArgs),
}

fn main() {
    let cli = Cli::parse();

    let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let ctx = Context::new(working_dir);

    if let Err(e) = run(&ctx, cli.command) {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run(ctx: &Context, command: Commands) -> Result<()> {
    match command {
        Commands::Enc {
            yaml_file,
            secret_file,
            vault,
        } => {
            let settings = Settings::from_args(&vault, None);
            EncodeCommand::execute(ctx, &settings, &yaml_file, secret_file.as_deref())
        }
        Commands::Dec { yaml_file, vault } => {
            let settings = Settings::from_args(&vault, None);
            DecodeCommand::execute(ctx, &settings, &yaml_file, DecodeMode::Write)
        }
        Commands::View { yaml_file, vault } => {
            let settings = Settings::from_args(&vault, None);
            DecodeCommand::execute(ctx, &settings, &yaml_file, DecodeMode::View)
        }
        Commands::Edit {
            yaml_file,
            editor,
            vault,
        } => {
            let settings = Settings::from_args(&vault, editor.filter(|e| !e.trim().is_empty()));
            DecodeCommand::execute(ctx, &settings, &yaml_file, DecodeMode::Edit)
        }
        Commands::Clean {
            file,
            environment,
            verbose,
        } => CleanCommand::execute(ctx, file.as_deref(), environment.as_deref(), verbose),
        Commands::Install(args) => run_helm(ctx, HelmAction::Install, &args),
        Commands::Template(args) => run_helm(ctx, HelmAction::Template, &args),
        Commands::Upgrade(args) => run_helm(ctx, HelmAction::Upgrade, &args),
        Commands::Lint(args) => run_helm(ctx, HelmAction::Lint, &args),
        Commands::Diff(args) => run_helm(ctx, HelmAction::Diff, &args),
    }
}

fn run_helm(ctx: &Context, action: HelmAction, args: &HelmArgs) -> Result<()> {
    let invocation = args.split()?;
    let settings = Settings::from_args(&invocation.vault, None);
    HelmCommand::execute(
        ctx,
        &settings,
        action,
        invocation.values.as_deref(),
        &invocation.helm_args,
    )
}
