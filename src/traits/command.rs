use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Stdio};

/// Trait for executing system commands, allowing for mocking in tests
pub trait CommandExecutor: Send + Sync {
    /// Execute a command and capture its stdout. Returns `None` when the
    /// command could not be started or exited non-zero.
    fn capture(&self, command: &str, args: &[&str], working_dir: &Path) -> Option<String>;

    /// Execute a command interactively (inherits stdin/stdout/stderr)
    fn execute_interactive(&self, command: &str, args: &[&str], working_dir: &Path) -> Result<i32>;
}

/// Real command executor using std::process::Command
pub struct RealCommandExecutor;

impl RealCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RealCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn capture(&self, command: &str, args: &[&str], working_dir: &Path) -> Option<String> {
        let output = Command::new(command)
            .args(args)
            .current_dir(working_dir)
            .stderr(Stdio::null())
            .output()
            .ok()?;

        if !output.status.success() {
            return None;
        }

        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn execute_interactive(&self, command: &str, args: &[&str], working_dir: &Path) -> Result<i32> {
        let mut child = Command::new(command)
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to start '{}'", command))?;

        let status = child.wait()?;
        Ok(status.code().unwrap_or(-1))
    }
}

/// Mock command executor for testing
#[cfg(test)]
pub struct MockCommandExecutor {
    /// Pre-configured results, consumed by command name
    outputs: std::sync::Mutex<Vec<MockCommandResult>>,
    /// Every invocation seen, as the command followed by its arguments
    calls: std::sync::Mutex<Vec<Vec<String>>>,
}

#[cfg(test)]
#[derive(Clone, Debug)]
pub struct MockCommandResult {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
}

#[cfg(test)]
impl MockCommandExecutor {
    pub fn new() -> Self {
        Self::with_outputs(Vec::new())
    }

    pub fn with_outputs(outputs: Vec<MockCommandResult>) -> Self {
        Self {
            outputs: std::sync::Mutex::new(outputs),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, command: &str, args: &[&str]) -> Option<MockCommandResult> {
        let mut call = vec![command.to_string()];
        call.extend(args.iter().map(|a| a.to_string()));
        self.calls.lock().unwrap().push(call);

        let mut outputs = self.outputs.lock().unwrap();
        let position = outputs.iter().position(|r| r.command == command)?;
        Some(outputs.remove(position))
    }
}

#[cfg(test)]
impl Default for MockCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl CommandExecutor for MockCommandExecutor {
    fn capture(&self, command: &str, args: &[&str], _working_dir: &Path) -> Option<String> {
        self.record(command, args)
            .filter(|result| result.exit_code == 0)
            .map(|result| result.stdout)
    }

    fn execute_interactive(
        &self,
        command: &str,
        args: &[&str],
        _working_dir: &Path,
    ) -> Result<i32> {
        // Default: success
        Ok(self.record(command, args).map(|r| r.exit_code).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_mock_executor_returns_configured_output() {
        let executor = MockCommandExecutor::with_outputs(vec![MockCommandResult {
            command: "git".to_string(),
            exit_code: 0,
            stdout: "/home/me/repo".to_string(),
        }]);

        let output = executor.capture("git", &["rev-parse"], &PathBuf::from("."));
        assert_eq!(output.as_deref(), Some("/home/me/repo"));
        assert_eq!(executor.calls(), vec![vec!["git", "rev-parse"]]);
    }

    #[test]
    fn test_mock_executor_capture_without_output_is_none() {
        let executor = MockCommandExecutor::new();
        assert!(executor.capture("git", &[], &PathBuf::from(".")).is_none());
    }

    #[test]
    fn test_mock_executor_interactive() {
        let executor = MockCommandExecutor::with_outputs(vec![MockCommandResult {
            command: "helm".to_string(),
            exit_code: 42,
            stdout: String::new(),
        }]);

        let code = executor
            .execute_interactive("helm", &["lint"], &PathBuf::from("."))
            .unwrap();
        assert_eq!(code, 42);
    }
}
