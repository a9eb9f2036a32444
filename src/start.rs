use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::app::{AppCore, PassReport};
use crate::args::{Args, Command};
use crate::docker::DockerError;
use crate::domain::{BatchOutcome, ContainerCheck, RecreateOutcome};
use crate::errors::DockerUpdateMgrError;
use crate::utils::datetime::{format_time_ago, parse_since};

/// Run the selected subcommand to completion.
///
/// # Errors
/// Returns an error if the daemon is unreachable, the container does not
/// exist, or an update did not succeed.
pub fn run_app(args: &Args) -> Result<(), DockerUpdateMgrError> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(dispatch(args))
}

async fn dispatch(args: &Args) -> Result<(), DockerUpdateMgrError> {
    let core = AppCore::connect(&args.app_config())?;

    match &args.command {
        Command::Info => {
            let info = core.info().await?;
            if args.json {
                return print_json(&info);
            }
            println!("Name:       {}", info.name);
            println!("Version:    {}", info.server_version);
            println!("OS:         {}", info.operating_system);
            println!(
                "Containers: {} ({} running)",
                info.containers, info.containers_running
            );
            println!("Images:     {}", info.images);
        }
        Command::List { all } => {
            let containers = core.list_containers(*all).await?;
            if args.json {
                return print_json(&containers);
            }
            for c in &containers {
                println!("{:<12}  {:<30}  {:<40}  {}", short(&c.id), c.name, c.image, c.status);
            }
        }
        Command::Check { all } => {
            let checks = core.check(*all).await?;
            if args.json {
                return print_json(&checks);
            }
            print_checks(&checks);
        }
        Command::Tags { image } => {
            let tags = core.tags(image).await;
            if args.json {
                return print_json(&tags);
            }
            for tag in &tags {
                println!("{tag}");
            }
        }
        Command::Update { container, tag } => {
            let outcome = core
                .update(container, tag.as_deref())
                .await
                .map_err(not_found)?;
            if args.json {
                print_json(&outcome)?;
            } else {
                print_outcome(&outcome);
            }
            if !outcome.success {
                return Err(DockerUpdateMgrError::UpdateFailed(outcome.message));
            }
        }
        Command::UpdateAll { .. } => {
            let batch = core.update_all().await?;
            report_batch(&batch, args.json)?;
        }
        Command::Start { container } => {
            core.start(container).await.map_err(not_found)?;
            info!(container = %container, "started");
        }
        Command::Stop { container } => {
            core.stop(container).await.map_err(not_found)?;
            info!(container = %container, "stopped");
        }
        Command::Restart { container } => {
            core.restart(container).await.map_err(not_found)?;
            info!(container = %container, "restarted");
        }
        Command::Logs {
            container,
            tail,
            since,
        } => {
            let since = since
                .as_deref()
                .map(|s| parse_since(s, Utc::now()))
                .transpose()
                .map_err(|e| DockerUpdateMgrError::Config(e.to_string()))?;
            let lines = core
                .logs(container, *tail, since)
                .await
                .map_err(not_found)?;
            if args.json {
                return print_json(&lines);
            }
            for line in &lines {
                println!("[{}] {}", line.stream.as_str(), line.message);
            }
        }
        Command::Watch { .. } => {
            let json = args.json;
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "cannot listen for ctrl-c");
                    std::future::pending::<()>().await;
                }
            };
            core.watch(shutdown, |report: PassReport| {
                if let Some(batch) = &report.batch {
                    for entry in core.journal().iter().take(batch.items.len()) {
                        info!(
                            id = entry.id,
                            container = %entry.container_name,
                            status = ?entry.status,
                            "{}",
                            entry.message
                        );
                    }
                }
                if json {
                    let value = serde_json::json!({
                        "checks": report.checks,
                        "batch": report.batch.as_ref().map(batch_json),
                    });
                    println!("{value}");
                    return;
                }
                print_checks(&report.checks);
                if let Some(batch) = &report.batch {
                    print_batch(batch);
                }
            })
            .await;
        }
    }
    Ok(())
}

fn not_found(e: DockerUpdateMgrError) -> DockerUpdateMgrError {
    match e {
        DockerUpdateMgrError::Docker(DockerError::NotFound(name)) => {
            DockerUpdateMgrError::ContainerNotFound(name)
        }
        other => other,
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), DockerUpdateMgrError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn short(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

fn print_checks(checks: &[ContainerCheck]) {
    let now = Utc::now();
    for c in checks {
        let state = match (&c.check.error, c.check.has_update) {
            (Some(err), _) => format!("error: {err}"),
            (None, true) => "update available".to_string(),
            (None, false) => "up to date".to_string(),
        };
        let newer = if c.check.latest_digest.is_some() {
            " (newer :latest exists)"
        } else {
            ""
        };
        println!(
            "{:<30}  {:<40}  {state}{newer}  [checked {}]",
            c.container.name,
            c.container.image,
            format_time_ago(c.check.checked_at, now)
        );
    }
}

fn print_outcome(outcome: &RecreateOutcome) {
    let mark = if outcome.success { "ok" } else { "FAILED" };
    println!("{}: {mark}: {}", outcome.container_name, outcome.message);
    let entry = &outcome.entry;
    println!(
        "  #{} {} {} ({}) -> {} ({})",
        entry.id,
        entry.timestamp.to_rfc3339(),
        entry.old_image,
        short(entry.old_image_id.trim_start_matches("sha256:")),
        entry.new_image,
        entry
            .new_image_id
            .as_deref()
            .map_or("-", |id| short(id.trim_start_matches("sha256:"))),
    );
}

fn print_batch(batch: &BatchOutcome) {
    for item in &batch.items {
        match &item.outcome {
            Ok(outcome) => print_outcome(outcome),
            Err(e) => println!("{}: FAILED: {e}", item.container_name),
        }
    }
    if let Some(name) = &batch.self_update_container_name {
        println!(
            "{name}: skipped (this is the updater's own container; \
             update it with `update {name}`)"
        );
    }
}

/// Per-container failures are reported in the batch itself; the run as a
/// whole still succeeds.
fn report_batch(batch: &BatchOutcome, json: bool) -> Result<(), DockerUpdateMgrError> {
    if json {
        print_json(&batch_json(batch))?;
    } else {
        print_batch(batch);
    }
    let failures = batch.failures();
    if failures > 0 {
        warn!(failures, total = batch.items.len(), "some containers failed to update");
    }
    Ok(())
}

fn batch_json(batch: &BatchOutcome) -> serde_json::Value {
    let items: Vec<serde_json::Value> = batch
        .items
        .iter()
        .map(|item| match &item.outcome {
            Ok(outcome) => serde_json::json!({
                "container": item.container_name,
                "outcome": outcome,
            }),
            Err(e) => serde_json::json!({
                "container": item.container_name,
                "error": e,
            }),
        })
        .collect();
    serde_json::json!({
        "items": items,
        "self_update_skipped": batch.self_update_skipped,
        "self_update_container_name": batch.self_update_container_name,
    })
}
