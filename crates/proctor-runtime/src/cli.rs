//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "proctor", about = "proctored coding-assessment runtime")]
pub struct Cli {
    /// Document store file (default: ./proctor-store.json)
    #[arg(long, global = true, env = "PROCTOR_STORE")]
    pub store: Option<PathBuf>,

    /// Session policy file (TOML)
    #[arg(long, global = true, env = "PROCTOR_POLICY")]
    pub policy: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run one proctored attempt against simulated devices
    Simulate(SimulateOpts),
    /// Manage tests, users and assignments
    Admin(AdminOpts),
    /// List a candidate's assignments
    Dashboard(DashboardOpts),
    /// Print the report and resume of a submission
    Report(ReportOpts),
    /// Execute a source file with a local interpreter
    RunCode(RunCodeOpts),
    /// Print the effective session policy as TOML
    Policy(PolicyOverrides),
}

/// Policy fields that can be overridden per invocation.
#[derive(Args, Default, Clone)]
pub struct PolicyOverrides {
    /// Auto-submit after this many warnings
    #[arg(long)]
    pub warning_threshold: Option<u32>,

    /// Clock tick period in milliseconds
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Presence check period in milliseconds
    #[arg(long)]
    pub presence_interval_ms: Option<u64>,

    /// Draft persistence quiet period in milliseconds
    #[arg(long)]
    pub draft_debounce_ms: Option<u64>,

    /// Viva recording limit in milliseconds
    #[arg(long)]
    pub recording_limit_ms: Option<u64>,

    /// Disable the face-presence check
    #[arg(long)]
    pub no_presence_check: bool,

    /// Show viva prompts without reading them aloud
    #[arg(long)]
    pub text_only: bool,
}

#[derive(Args)]
pub struct SimulateOpts {
    /// Use this assignment from the store instead of an in-memory demo
    #[arg(long)]
    pub assignment: Option<String>,

    /// Demo test duration in minutes
    #[arg(long, default_value = "1")]
    pub duration_minutes: u64,

    /// Scenario file: JSON array of timed steps
    #[arg(long)]
    pub scenario: Option<PathBuf>,

    /// Submit manually after this many seconds instead of waiting for expiry
    #[arg(long)]
    pub submit_after: Option<u64>,

    #[command(flatten)]
    pub policy: PolicyOverrides,
}

#[derive(Args)]
pub struct AdminOpts {
    /// Acting administrator uid
    #[arg(long = "as", value_name = "UID", global = true)]
    pub actor: Option<String>,

    #[command(subcommand)]
    pub command: AdminCommand,
}

#[derive(Subcommand)]
pub enum AdminCommand {
    /// Create a test definition
    CreateTest(CreateTestOpts),
    /// Create a user account (the first admin needs no --as)
    CreateUser(CreateUserOpts),
    /// Assign a test to a candidate
    Assign(AssignOpts),
    /// List tests, newest first
    Tests,
    /// List candidates
    Candidates,
    /// List every assignment
    Assignments,
}

#[derive(Args)]
pub struct CreateTestOpts {
    #[arg(long)]
    pub title: String,

    /// Job role the test targets
    #[arg(long)]
    pub role: String,

    /// Topic (repeatable)
    #[arg(long = "topic", required = true)]
    pub topics: Vec<String>,

    #[arg(long, default_value = "45")]
    pub duration_minutes: u64,

    /// Skip the spoken viva section
    #[arg(long)]
    pub no_viva: bool,
}

#[derive(Args)]
pub struct CreateUserOpts {
    #[arg(long)]
    pub email: String,

    #[arg(long, env = "PROCTOR_PASSWORD")]
    pub password: String,

    #[arg(long, default_value = "")]
    pub name: String,

    /// admin or user
    #[arg(long, default_value = "user")]
    pub role: String,
}

#[derive(Args)]
pub struct AssignOpts {
    #[arg(long)]
    pub test: String,

    #[arg(long)]
    pub user: String,
}

#[derive(Args)]
pub struct DashboardOpts {
    /// Candidate uid
    #[arg(long)]
    pub user: String,
}

#[derive(Args)]
pub struct ReportOpts {
    #[arg(long)]
    pub test: String,

    #[arg(long)]
    pub user: String,

    /// Print the resume instead of the summary report
    #[arg(long)]
    pub resume: bool,
}

#[derive(Args)]
pub struct RunCodeOpts {
    /// python, cpp, java, javascript (or the execution-service id)
    #[arg(long, default_value = "python")]
    pub language: String,

    #[arg(long)]
    pub file: PathBuf,
}

/// Default store location in the working directory.
pub fn default_store_path() -> PathBuf {
    PathBuf::from("proctor-store.json")
}
