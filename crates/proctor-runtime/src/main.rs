//! proctor: proctored coding-assessment runtime binary.
//! Runs the session controller against simulated devices and a JSON
//! document store, plus the admin and candidate surfaces over that store.

use clap::Parser;

mod cli;
mod cmd_admin;
mod cmd_dashboard;
mod cmd_run;
mod cmd_simulate;
mod config;
mod context;
mod file_store;
mod identity;
mod runner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("PROCTOR_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let store_path = args.store.unwrap_or_else(cli::default_store_path);
    let policy_path = args.policy.as_deref();

    match args.command {
        cli::Command::Simulate(opts) => {
            let policy = config::effective_policy(policy_path, &opts.policy)?;
            tracing::info!(?policy, "proctor simulate starting");
            let report = cmd_simulate::cmd_simulate(&store_path, policy, &opts).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        cli::Command::Admin(opts) => {
            cmd_admin::cmd_admin(&store_path, &opts).await?;
        }
        cli::Command::Dashboard(opts) => {
            cmd_dashboard::cmd_dashboard(&store_path, &opts).await?;
        }
        cli::Command::Report(opts) => {
            cmd_dashboard::cmd_report(&store_path, &opts).await?;
        }
        cli::Command::RunCode(opts) => {
            cmd_run::cmd_run_code(&opts).await?;
        }
        cli::Command::Policy(overrides) => {
            let policy = config::effective_policy(policy_path, &overrides)?;
            print!("{}", config::to_toml(&policy)?);
        }
    }

    Ok(())
}
