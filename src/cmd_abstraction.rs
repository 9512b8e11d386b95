//! External process abstraction.
//!
//! dnsmasq, dig, ip and the service manager are all reached through
//! [`CommandExecutor`], so tests can script their output with the mockall
//! generated `MockCommandExecutor`.

use anyhow::{Context, Result};
use std::process::{Command, Stdio};

#[cfg(test)]
use mockall::automock;

/// Captured result of one external command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit status was zero
    pub success: bool,
    pub code: Option<i32>,
}

/// Runs external programs.
///
/// An `Err` means the program could not be started at all (usually not
/// installed); a program that ran and failed returns `Ok` with
/// `success == false`.
#[cfg_attr(test, automock)]
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, cmd: &str, args: &[String]) -> Result<CommandOutput>;
}

/// [`CommandExecutor`] backed by `std::process::Command`.
#[derive(Debug, Clone, Default)]
pub struct RealCommandExecutor;

impl RealCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, cmd: &str, args: &[String]) -> Result<CommandOutput> {
        let output = Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Failed to execute {}", cmd))?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        })
    }
}

/// mockall cannot express `&[&str]` in a trait signature, so arguments
/// travel as owned strings.
pub fn args_to_strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_to_strings() {
        let args = args_to_strings(&["dnsmasq", "restart"]);
        assert_eq!(args, vec!["dnsmasq", "restart"]);
        assert!(args_to_strings(&[]).is_empty());
    }

    #[test]
    fn test_command_output_default() {
        let output = CommandOutput::default();
        assert!(output.stdout.is_empty());
        assert!(!output.success);
        assert!(output.code.is_none());
    }

    #[test]
    fn test_real_executor_echo() {
        let executor = RealCommandExecutor::new();
        let output = executor
            .execute("echo", &args_to_strings(&["-n", "hello"]))
            .unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, "hello");
    }

    #[test]
    fn test_real_executor_failing_command() {
        let executor = RealCommandExecutor::new();
        let output = executor
            .execute("ls", &args_to_strings(&["--invalid-flag"]))
            .unwrap();
        assert!(!output.success);
    }

    #[test]
    fn test_real_executor_missing_program() {
        let executor = RealCommandExecutor::new();
        let result = executor.execute("notrack-no-such-program", &[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_mock_executor() {
        let mut mock = MockCommandExecutor::new();
        mock.expect_execute()
            .withf(|cmd, args| cmd == "dig" && args == ["-v".to_string()])
            .times(1)
            .returning(|_, _| {
                Ok(CommandOutput {
                    stderr: "DiG 9.16.1".to_string(),
                    success: true,
                    code: Some(0),
                    ..Default::default()
                })
            });

        let output = mock.execute("dig", &args_to_strings(&["-v"])).unwrap();
        assert!(output.success);
    }
}
