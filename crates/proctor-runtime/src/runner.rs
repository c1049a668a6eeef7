//! `CodeRunner` that executes interpreted languages with local interpreters.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use proctor_core::error::{ProctorError, Result};
use proctor_core::{ExecutionOutput, Language};
use proctor_session::ports::CodeRunner;

pub struct LocalRunner {
    timeout: Duration,
}

impl LocalRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for LocalRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

/// Interpreter and its inline-source flag.
fn interpreter(language: Language) -> Option<(&'static str, &'static str)> {
    match language {
        Language::Python => Some(("python3", "-c")),
        Language::JavaScript => Some(("node", "-e")),
        Language::Cpp | Language::Java => None,
    }
}

#[async_trait]
impl CodeRunner for LocalRunner {
    async fn run(&self, source: &str, language: Language) -> Result<ExecutionOutput> {
        let (program, flag) = interpreter(language).ok_or_else(|| {
            ProctorError::ExecutionFailure(format!(
                "{language} (id {}) needs the hosted execution service",
                language.id()
            ))
        })?;

        let child = Command::new(program)
            .arg(flag)
            .arg(source)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                ProctorError::ExecutionFailure(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| ProctorError::ExecutionFailure(format!("{program}: {e}")))?;

        tracing::debug!(%language, status = ?output.status, "code executed");
        Ok(ExecutionOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
