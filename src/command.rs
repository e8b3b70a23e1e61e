//! External command seam.
//!
//! The sampler shells out to `free` and `ps`; tests swap in canned output
//! through [`CommandRunner`].

use std::process::Command;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub trait CommandRunner {
    fn run(&self, argv: &[&str]) -> Result<CommandOutput>;
}

/// Runs commands with `std::process::Command`, capturing stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[&str]) -> Result<CommandOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or(Error::EmptyCommand)?;
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| Error::Spawn {
                program: (*program).to_string(),
                source,
            })?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            exit_code: output.status.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_argv_is_rejected() {
        assert!(matches!(SystemRunner.run(&[]), Err(Error::EmptyCommand)));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = SystemRunner
            .run(&["memwidget-definitely-not-installed"])
            .unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }
}
