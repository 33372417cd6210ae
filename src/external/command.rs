// src/external/command.rs

//! Collaborators backed by templated shell commands.
//!
//! Each template is run through `sh -c` (`cmd /C` on Windows) after
//! substituting its placeholders:
//!
//! | template    | placeholders                           | success            |
//! |-------------|----------------------------------------|--------------------|
//! | `ingest`    | `{job_id}`                             | exit 0             |
//! | `check`     | `{check}`, `{subpath}`, `{data_source}`| exit 0 (else fail) |
//! | `catalog`   | none                                   | exit 0; one model per non-empty stdout line |
//! | `transform` | `{model}`                              | exit 0             |
//!
//! Placeholder values are substituted verbatim, without shell quoting.
//!
//! Every child is spawned with `kill_on_drop(true)`: when the executor stops
//! waiting on an action (timeout, cancellation), the process is killed.

use std::process::Stdio;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::exec::{ActionContext, BoxFuture, TaskAction};
use crate::external::{
    CheckOutcome, CheckRunner, CheckSpec, IngestionTrigger, ModelCatalog, TransformRunner,
};

/// Command templates, one per collaborator. This is the `[backend]` section
/// of the config file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct CommandTemplates {
    #[serde(default)]
    pub ingest: Option<String>,
    #[serde(default)]
    pub check: Option<String>,
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default)]
    pub transform: Option<String>,
}

/// Implements every collaborator contract by running shell commands.
#[derive(Debug, Clone, Default)]
pub struct CommandBackend {
    templates: CommandTemplates,
}

impl CommandBackend {
    pub fn new(templates: CommandTemplates) -> Self {
        Self { templates }
    }

    fn template(&self, which: &str, value: &Option<String>) -> Result<String> {
        value
            .clone()
            .ok_or_else(|| anyhow!("no `{which}` command configured in [backend]"))
    }
}

impl IngestionTrigger for CommandBackend {
    fn trigger(&self, job_id: &str) -> BoxFuture<'static, Result<()>> {
        let cmd = self
            .template("ingest", &self.templates.ingest)
            .map(|t| render(&t, &[("job_id", job_id)]));
        Box::pin(async move { run_to_success(&cmd?).await })
    }
}

impl CheckRunner for CommandBackend {
    fn run_check(&self, check: &CheckSpec) -> BoxFuture<'static, Result<CheckOutcome>> {
        let cmd = self.template("check", &self.templates.check).map(|t| {
            render(
                &t,
                &[
                    ("check", check.name.as_str()),
                    ("subpath", check.subpath.as_str()),
                    ("data_source", check.data_source.as_str()),
                ],
            )
        });
        Box::pin(async move {
            let output = run_shell(&cmd?).await?;
            if output.success {
                Ok(CheckOutcome::Pass)
            } else {
                Ok(CheckOutcome::Fail(output.failure_summary()))
            }
        })
    }
}

impl ModelCatalog for CommandBackend {
    fn list_models(&self) -> BoxFuture<'static, Result<Vec<String>>> {
        let cmd = self.template("catalog", &self.templates.catalog);
        Box::pin(async move {
            let cmd = cmd?;
            let output = run_shell(&cmd).await?;
            if !output.success {
                bail!("catalog command `{cmd}` {}", output.failure_summary());
            }
            let models: Vec<String> = output
                .stdout
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
            info!(count = models.len(), "catalog listed models");
            Ok(models)
        })
    }
}

impl TransformRunner for CommandBackend {
    fn run_model(&self, model: &str) -> BoxFuture<'static, Result<()>> {
        let cmd = self
            .template("transform", &self.templates.transform)
            .map(|t| render(&t, &[("model", model)]));
        Box::pin(async move { run_to_success(&cmd?).await })
    }
}

/// A task whose action is a literal shell command.
#[derive(Debug, Clone)]
pub struct ShellAction {
    cmd: String,
}

impl ShellAction {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

impl TaskAction for ShellAction {
    fn run(&self, ctx: ActionContext) -> BoxFuture<'static, Result<()>> {
        let cmd = self.cmd.clone();
        Box::pin(async move {
            debug!(task = %ctx.task, attempt = ctx.attempt, cmd = %cmd, "running shell action");
            run_to_success(&cmd).await
        })
    }

    fn describe(&self) -> String {
        format!("sh: {}", self.cmd)
    }
}

/// Substitute `{key}` placeholders.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}

#[derive(Debug)]
struct ShellOutput {
    success: bool,
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

impl ShellOutput {
    fn failure_summary(&self) -> String {
        let code = self
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        match self.stderr.lines().rev().find(|l| !l.trim().is_empty()) {
            Some(last) => format!("exited with {code}: {}", last.trim()),
            None => format!("exited with {code}"),
        }
    }
}

async fn run_to_success(cmd: &str) -> Result<()> {
    let output = run_shell(cmd).await?;
    if output.success {
        Ok(())
    } else {
        bail!("command `{cmd}` {}", output.failure_summary())
    }
}

async fn run_shell(cmd: &str) -> Result<ShellOutput> {
    // Build a shell command appropriate for the platform.
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(cmd = %cmd, "spawning process");
    let output = command
        .output()
        .await
        .with_context(|| format!("running `{cmd}`"))?;

    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    for line in stderr.lines() {
        debug!(cmd = %cmd, "stderr: {}", line);
    }

    debug!(
        cmd = %cmd,
        exit_code = ?output.status.code(),
        success = output.status.success(),
        "process exited"
    );

    Ok(ShellOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr,
    })
}
