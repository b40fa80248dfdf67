use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{anyhow, Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandEffect {
    ReadOnly,
    Mutating,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Option<BTreeMap<String, String>>,
    pub current_dir: Option<PathBuf>,
    pub effect: CommandEffect,
}

impl CommandSpec {
    fn new<I, S>(program: impl Into<String>, args: I, effect: CommandEffect) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: None,
            current_dir: None,
            effect,
        }
    }

    pub fn read_only<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(program, args, CommandEffect::ReadOnly)
    }

    pub fn mutating<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(program, args, CommandEffect::Mutating)
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn display_line(&self) -> String {
        let mut line = format!("+ {}", shell_quote(&self.program));
        for arg in &self.args {
            line.push(' ');
            line.push_str(&shell_quote(arg));
        }
        line
    }

    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(env) = &self.env {
            command.env_clear().envs(env);
        }
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandRunner {
    dry_run: bool,
}

impl CommandRunner {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn run(&self, spec: &CommandSpec) -> Result<String> {
        let stdout = self.run_raw(spec)?;
        String::from_utf8(stdout)
            .map_err(|err| anyhow!("{}: output is not UTF-8: {err}", spec.program))
    }

    pub fn run_raw(&self, spec: &CommandSpec) -> Result<Vec<u8>> {
        if self.dry_run && spec.effect == CommandEffect::Mutating {
            println!("{}", spec.display_line());
            return Ok(Vec::new());
        }

        tracing::debug!(command = %spec.display_line(), "running command");
        let output = spec
            .to_command()
            .output()
            .with_context(|| format!("{}: command failed to start", spec.program))?;
        if output.status.success() {
            return Ok(output.stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(anyhow!(
            "{}: status={} stderr='{}'",
            spec.display_line(),
            output.status,
            stderr_tail(&stderr)
        ))
    }
}

fn stderr_tail(stderr: &str) -> String {
    const TAIL_LINES: usize = 20;
    let lines = stderr.trim().lines().collect::<Vec<_>>();
    let start = lines.len().saturating_sub(TAIL_LINES);
    lines[start..].join("\n")
}

pub(crate) fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "-_./=:,+@%".contains(ch));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
