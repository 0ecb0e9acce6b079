use crate::context::Context;
use crate::document::{WORKING_FILE_EXTENSION, working_file_name};
use anyhow::{Context as AnyhowContext, Result};
use std::path::{Path, PathBuf};

/// Handles the 'clean' command - removes decoded working files
pub struct CleanCommand;

impl CleanCommand {
    /// Remove the working file of `yaml_file`, or every `*.dec` file in the
    /// working directory when no file is named
    pub fn execute(
        ctx: &Context,
        yaml_file: Option<&str>,
        environment: Option<&str>,
        verbose: bool,
    ) -> Result<()> {
        let targets = match yaml_file {
            Some(file) => {
                let target = working_file_name(Path::new(file), environment);
                if !ctx.fs.exists(&target) {
                    ctx.output
                        .warning(&format!("Nothing to clean: {} does not exist", target.display()));
                    return Ok(());
                }
                vec![target]
            }
            None => Self::working_files(ctx)?,
        };

        for target in &targets {
            ctx.fs
                .remove_file(target)
                .with_context(|| format!("Failed to delete {}", target.display()))?;
            if verbose {
                ctx.output.dimmed(&format!("Deleted {}", target.display()));
            }
        }

        ctx.output
            .success(&format!("Removed {} working file(s)", targets.len()));
        Ok(())
    }

    fn working_files(ctx: &Context) -> Result<Vec<PathBuf>> {
        let files = ctx
            .fs
            .read_dir(&ctx.working_dir)
            .with_context(|| format!("Failed to list {}", ctx.working_dir.display()))?;

        Ok(files
            .into_iter()
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext == WORKING_FILE_EXTENSION)
            })
            .collect())
    }
}
