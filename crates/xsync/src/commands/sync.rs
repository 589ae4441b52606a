//! `sync` handler: one feed run, or a periodic loop until Ctrl-C.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use xsync_core::{RunReport, Syncer};

use crate::cli::{GlobalOpts, SyncArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: &SyncArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load(global)?;
    config::apply_sync(&mut cfg, args);

    let token = config::resolve_token(&cfg.feed, args.token.as_deref())?;
    let feed = cfg.feed_config(token)?;
    let syncer = Syncer::new(
        &feed,
        cfg.xray_config(),
        cfg.sync_config()?,
        cfg.storage_config(),
        cfg.user_defaults(),
    )?;

    let report = match cfg.interval() {
        Some(interval) => {
            let shutdown = CancellationToken::new();
            tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));
            info!(
                feed = %feed.url,
                interval = %humantime::format_duration(interval),
                "sync loop started"
            );
            syncer.run_every(interval, shutdown).await
        }
        None => syncer.run_once().await?,
    };

    output::print_output(&output::render_run(global.output, &report), global.quiet);
    verdict(&report)
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("interrupt received; stopping after the current run");
            shutdown.cancel();
        }
        Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
    }
}

/// Failed jobs win over aborted groups: both exit with the degraded code.
fn verdict(report: &RunReport) -> Result<(), CliError> {
    let total = report.total();
    if total.is_degraded() {
        return Err(CliError::Degraded {
            failed: total.failed,
            total: total.total(),
        });
    }
    let aborted = report.kinds.iter().filter(|k| k.error.is_some()).count();
    if aborted > 0 {
        return Err(CliError::KindsAborted { kinds: aborted });
    }
    Ok(())
}
