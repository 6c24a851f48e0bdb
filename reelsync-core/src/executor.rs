use std::path::Path;
use std::process::Output;

use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command failed ({command}): {stderr}")]
    Failure {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
}

impl CommandError {
    pub fn stderr(&self) -> Option<&str> {
        match self {
            CommandError::Failure { stderr, .. } => Some(stderr),
            CommandError::Spawn { .. } => None,
        }
    }
}

/// Seam for running external tools so tests can fake ffmpeg and ffprobe.
#[async_trait::async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, command: &mut Command) -> std::io::Result<Output>;
}

#[derive(Debug, Default)]
pub struct SystemCommandExecutor;

#[async_trait::async_trait]
impl CommandExecutor for SystemCommandExecutor {
    async fn run(&self, command: &mut Command) -> std::io::Result<Output> {
        // A dropped future (timeout, cancellation) must not leave ffmpeg running.
        command.kill_on_drop(true);
        command.output().await
    }
}

pub fn command_line(program: &Path, args: &[String]) -> String {
    let mut line = program.display().to_string();
    for arg in args {
        line.push(' ');
        if arg.contains(char::is_whitespace) || arg.is_empty() {
            line.push('"');
            line.push_str(arg);
            line.push('"');
        } else {
            line.push_str(arg);
        }
    }
    line
}

/// Runs `program` and returns its output, mapping a non-zero exit into
/// [`CommandError::Failure`].
pub async fn run_checked(
    executor: &dyn CommandExecutor,
    program: &Path,
    args: &[String],
) -> Result<Output, CommandError> {
    let mut command = Command::new(program);
    command.args(args);
    let output = executor
        .run(&mut command)
        .await
        .map_err(|source| CommandError::Spawn {
            command: command_line(program, args),
            source,
        })?;
    if !output.status.success() {
        return Err(CommandError::Failure {
            command: command_line(program, args),
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_quotes_arguments_with_spaces() {
        let line = command_line(
            Path::new("/usr/bin/ffmpeg"),
            &["-vf".to_string(), "scale=1:1, fps=24".to_string()],
        );
        assert_eq!(line, "/usr/bin/ffmpeg -vf \"scale=1:1, fps=24\"");
    }
}
