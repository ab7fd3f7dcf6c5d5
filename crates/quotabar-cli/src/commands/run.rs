//! Run command
//!
//! Foreground monitor: spawns the polling scheduler, prints every new status
//! and every alert, and forwards Ctrl-C and stdin commands to it.

use std::io::BufRead;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::mpsc;

use quotabar_core::services::quota::{
    ClaudeUsageClient, PollScheduler, PollSchedulerConfig, PresentationDescriptor,
};

use super::Context;
use crate::output::{
    print_alert, print_descriptor, print_info, print_json_line, print_success, OutputFormat,
};

/// Line commands typed on stdin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StdinCommand {
    Refresh,
    Quit,
}

fn parse_stdin_command(line: &str) -> Option<StdinCommand> {
    match line.trim().to_lowercase().as_str() {
        "r" | "refresh" => Some(StdinCommand::Refresh),
        "q" | "quit" | "exit" => Some(StdinCommand::Quit),
        _ => None,
    }
}

/// Read stdin on a plain thread; a tokio stdin read would hold up runtime shutdown
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<StdinCommand> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if let Some(command) = parse_stdin_command(&line) {
                if tx.send(command).is_err() {
                    break;
                }
            }
        }
    });
    rx
}

pub async fn execute(ctx: &Context) -> Result<()> {
    let config = ctx.load_configured()?;
    let client = ClaudeUsageClient::from_config(&config)?;
    let scheduler_config = PollSchedulerConfig::from_app_config(&config);

    print_info(
        &format!(
            "Polling every {}s. Type `r` + Enter to refresh, `q` to quit.",
            scheduler_config.base_interval_seconds
        ),
        ctx.quiet || ctx.format == OutputFormat::Json,
    );

    let (handle, mut alerts, join) = PollScheduler::spawn(Arc::new(client), scheduler_config);
    let mut snapshots = handle.subscribe();
    let mut stdin = spawn_stdin_reader();
    let mut stdin_open = true;
    let mut last_descriptor: Option<PresentationDescriptor> = None;

    // One listener for the whole session so no Ctrl-C is lost between iterations
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ctrl_c_armed = true;

    loop {
        tokio::select! {
            result = &mut ctrl_c, if ctrl_c_armed => match result {
                Ok(()) => {
                    log::info!("[quota:timer] Ctrl-C received, stopping");
                    break;
                }
                Err(e) => {
                    log::warn!("[quota:timer] Cannot listen for Ctrl-C: {}", e);
                    ctrl_c_armed = false;
                }
            },
            command = stdin.recv(), if stdin_open => match command {
                Some(StdinCommand::Refresh) => {
                    if !handle.request_refresh() {
                        break;
                    }
                }
                Some(StdinCommand::Quit) => break,
                None => stdin_open = false,
            },
            Some(alert) = alerts.recv() => match ctx.format {
                OutputFormat::Json => print_json_line(&alert)?,
                OutputFormat::Table => print_alert(&alert, Utc::now()),
            },
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if snapshot.is_polling {
                    continue;
                }
                match ctx.format {
                    OutputFormat::Json => print_json_line(&snapshot)?,
                    OutputFormat::Table => {
                        if last_descriptor.as_ref() != Some(&snapshot.descriptor) {
                            print_descriptor(&snapshot.descriptor);
                        }
                    }
                }
                last_descriptor = Some(snapshot.descriptor);
            }
        }
    }

    handle.stop().await;
    let final_state = join.await?;

    // Alerts raised by the last poll before shutdown
    while let Ok(alert) = alerts.try_recv() {
        match ctx.format {
            OutputFormat::Json => print_json_line(&alert)?,
            OutputFormat::Table => print_alert(&alert, Utc::now()),
        }
    }

    print_success(
        &format!("Stopped after {} poll(s).", final_state.poll_count),
        ctx.quiet || ctx.format == OutputFormat::Json,
    );
    Ok(())
}
