//! `proctor run-code`: execute a file the way the editor's Run button does.

use std::str::FromStr;

use anyhow::Context;
use proctor_core::Language;
use proctor_session::ports::CodeRunner;

use crate::cli::RunCodeOpts;
use crate::runner::LocalRunner;

/// Entry point for `proctor run-code`.
pub async fn cmd_run_code(opts: &RunCodeOpts) -> anyhow::Result<()> {
    let language = Language::from_str(&opts.language)?;
    let source = tokio::fs::read_to_string(&opts.file)
        .await
        .with_context(|| format!("cannot read {}", opts.file.display()))?;
    let output = LocalRunner::default().run(&source, language).await?;
    print!("{}", output.render());
    Ok(())
}
