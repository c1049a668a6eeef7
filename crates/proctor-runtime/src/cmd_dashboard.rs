//! `proctor dashboard` and `proctor report`: the candidate's view.

use std::path::Path;

use proctor_session::{DashboardEntry, DashboardService};

use crate::cli::{DashboardOpts, ReportOpts};
use crate::context::{LocalContext, status_label};

fn service(ctx: &LocalContext) -> DashboardService {
    DashboardService::new(ctx.store.clone(), ctx.identity.clone(), ctx.navigator.clone())
}

pub(crate) fn format_entries(entries: &[DashboardEntry]) -> String {
    entries
        .iter()
        .map(|entry| {
            let (title, minutes) = match &entry.test {
                Some(test) => (test.title.as_str(), format!("{} min", test.duration_minutes)),
                None => ("(deleted test)", "-".to_string()),
            };
            format!(
                "{}  {:<12}  {}  {}",
                entry.assignment.id,
                status_label(entry.assignment.status),
                title,
                minutes
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Entry point for `proctor dashboard`.
pub async fn cmd_dashboard(store_path: &Path, opts: &DashboardOpts) -> anyhow::Result<()> {
    let ctx = LocalContext::open(store_path).await?;
    ctx.actor(Some(&opts.user)).await?;
    let entries = service(&ctx).my_assignments().await?;
    if entries.is_empty() {
        println!("no assignments");
    } else {
        println!("{}", format_entries(&entries));
    }
    Ok(())
}

/// Entry point for `proctor report`.
pub async fn cmd_report(store_path: &Path, opts: &ReportOpts) -> anyhow::Result<()> {
    let ctx = LocalContext::open(store_path).await?;
    ctx.actor(Some(&opts.user)).await?;
    let view = service(&ctx).load_report(&opts.test).await?;
    if let Some(title) = &view.test_title {
        println!("# {title}\n");
    }
    if opts.resume && view.found {
        println!("{}", view.resume);
    } else {
        println!("{}", view.summary);
    }
    Ok(())
}
