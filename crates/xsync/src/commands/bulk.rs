//! `bulk-add` handler: CSV rows through the worker pool.

use std::sync::Arc;

use tracing::{info, warn};

use xsync_core::{Reconciler, Summary, read_csv_file};

use crate::cli::{BulkAddArgs, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output::{self, BulkReport};

use super::util;

pub async fn handle(args: &BulkAddArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load(global)?;
    config::apply_policy(&mut cfg, &args.policy);
    config::apply_user_defaults(&mut cfg, &args.defaults);
    if let Some(concurrency) = args.concurrency {
        cfg.sync.concurrency = concurrency;
    }

    let sync = cfg.sync_config()?;
    let import = read_csv_file(
        &args.file,
        config::protocol(args.proto),
        &cfg.user_defaults(),
    )?;
    for row in &import.rejected {
        warn!(line = row.line, reason = %row.reason, "skipping CSV row");
    }

    let summary = if import.users.is_empty() {
        info!(file = %args.file.display(), "no valid rows; nothing to add");
        Summary::default()
    } else {
        let store = util::open_store(args.target.store.as_deref())?;
        let client = util::connect(&cfg, &args.target.tags).await?;
        info!(
            users = import.users.len(),
            xray = client.address(),
            tags = ?client.tags(),
            workers = sync.concurrency,
            "bulk add"
        );

        let mut reconciler = Reconciler::new(client, sync);
        if let Some(store) = store {
            reconciler = reconciler.with_write_through(Arc::new(store));
        }
        let (summary, _) = reconciler.add_all(import.users).await;
        summary
    };

    let report = BulkReport {
        summary,
        rejected: import.rejected,
    };
    output::print_output(&output::render_bulk(global.output, &report), global.quiet);

    if summary.is_degraded() {
        return Err(CliError::Degraded {
            failed: summary.failed,
            total: summary.total(),
        });
    }
    Ok(())
}
