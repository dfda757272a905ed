use std::io::Write;

use anyhow::{bail, Context};
use jobwatch_status::StatusClient;

use crate::cli::Command;

/// Execute `command` against `client`, writing results to `out`.
pub async fn run<W: Write>(
    command: &Command,
    client: &StatusClient,
    out: &mut W,
) -> anyhow::Result<()> {
    match command {
        Command::Show { job_id } => {
            let status = client.load(job_id).await?;
            let json = serde_json::to_string_pretty(status.record())?;
            writeln!(out, "{json}")?;
        }
        Command::List {
            offset,
            limit,
            full,
        } => {
            if *full {
                for status in client.statuses(*offset, *limit).await? {
                    writeln!(out, "{}", serde_json::to_string(status.record())?)?;
                }
            } else {
                for (job_id, status) in client.status_jids(*offset, *limit).await? {
                    writeln!(out, "{job_id}\t{status}")?;
                }
            }
        }
        Command::Count => {
            writeln!(out, "{}", client.size().await?)?;
        }
        Command::Kill { job_id } => {
            let status = client.load(job_id).await?;
            if !status.status().is_active() {
                bail!("job {} is already {}", job_id, status.status());
            }
            if status.is_kill_requested().await? {
                writeln!(out, "kill already requested for {job_id}")?;
                return Ok(());
            }
            status.request_kill().await?;
            writeln!(out, "kill requested for {job_id}")?;
        }
        Command::Kills => {
            let pending = client
                .kill_registry()
                .pending()
                .await
                .context("failed to read kill requests")?;
            for (job_id, requested_at) in pending {
                writeln!(out, "{job_id}\t{}", requested_at.to_rfc3339())?;
            }
        }
        Command::Purge { statuses } => {
            let filter = (!statuses.is_empty()).then_some(statuses.as_slice());
            let removed = client.delete(filter).await?;
            tracing::info!(removed, "status records purged");
            writeln!(out, "{removed}")?;
        }
        Command::Delete { job_id } => {
            let status = client.load(job_id).await?;
            status.delete().await?;
            writeln!(out, "deleted {job_id}")?;
        }
    }
    Ok(())
}
