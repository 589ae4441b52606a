//! CLI configuration: thin wrapper around `xsync_config`.
//!
//! Loads the shared config and layers command-line flags on top, so every
//! command sees one `Config` with flag > env > file > default precedence.

use std::path::PathBuf;

use xsync_core::Protocol;

use crate::cli::{
    GlobalOpts, IdempotencyArg, ModeArg, PolicyArgs, ProtocolArg, SyncArgs, UserDefaultArgs,
};
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use xsync_config::{Config, config_path, load_config, resolve_token, save_config};

// ── Loading ─────────────────────────────────────────────────────────

/// The config file this invocation reads: `--config` or the platform default.
pub fn resolved_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

/// Load file + env, then apply the global flags.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = load_config(Some(&resolved_path(global)))?;
    apply_global(&mut cfg, global);
    Ok(cfg)
}

// ── Flag overrides ──────────────────────────────────────────────────

fn apply_global(cfg: &mut Config, global: &GlobalOpts) {
    if let Some(ref address) = global.xray {
        cfg.xray.address.clone_from(address);
    }
    if let Some(timeout) = global.timeout {
        cfg.xray.timeout_secs = timeout;
    }
}

pub fn apply_policy(cfg: &mut Config, policy: &PolicyArgs) {
    if let Some(idempotency) = policy.idempotency {
        cfg.sync.idempotency = idempotency_name(idempotency).into();
    }
    if let Some(retries) = policy.retries {
        cfg.sync.retries = retries;
    }
}

pub fn apply_user_defaults(cfg: &mut Config, defaults: &UserDefaultArgs) {
    if let Some(level) = defaults.level {
        cfg.defaults.level = level;
    }
    if let Some(ref flow) = defaults.flow {
        cfg.defaults.flow.clone_from(flow);
    }
}

pub fn apply_sync(cfg: &mut Config, args: &SyncArgs) {
    if let Some(ref url) = args.feed_url {
        cfg.feed.url = Some(url.clone());
    }
    if let Some(ref server_id) = args.server_id {
        cfg.feed.server_id = Some(server_id.clone());
    }
    if let Some(mode) = args.mode {
        cfg.sync.mode = mode_name(mode).into();
    }
    if args.reseed {
        cfg.sync.reseed = true;
    }
    if let Some(concurrency) = args.concurrency {
        cfg.sync.concurrency = concurrency;
    }
    if let Some(interval) = args.interval {
        cfg.sync.interval_secs = interval.as_secs().max(1);
    }
    if let Some(ref db) = args.db {
        cfg.storage.db.clone_from(db);
    }
    if let Some(ref snapshots) = args.snapshots {
        cfg.storage.snapshots.clone_from(snapshots);
    }
    apply_policy(
        cfg,
        &PolicyArgs {
            idempotency: args.idempotency,
            retries: args.retries,
        },
    );
    apply_user_defaults(cfg, &args.defaults);
}

// ── Value enum translation ──────────────────────────────────────────

pub fn protocol(arg: ProtocolArg) -> Protocol {
    match arg {
        ProtocolArg::Vless => Protocol::Vless,
        ProtocolArg::Vmess => Protocol::Vmess,
    }
}

fn mode_name(arg: ModeArg) -> &'static str {
    match arg {
        ModeArg::Replace => "replace",
        ModeArg::Upsert => "upsert",
    }
}

fn idempotency_name(arg: IdempotencyArg) -> &'static str {
    match arg {
        IdempotencyArg::Skip => "skip",
        IdempotencyArg::Success => "success",
        IdempotencyArg::Fail => "fail",
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use xsync_core::{IdempotencyPolicy, SyncMode};

    use super::*;

    fn sync_args() -> SyncArgs {
        SyncArgs {
            feed_url: Some("https://panel.example/feed".into()),
            token: None,
            server_id: Some("srv-1".into()),
            mode: Some(ModeArg::Upsert),
            reseed: true,
            concurrency: Some(32),
            retries: Some(5),
            idempotency: Some(IdempotencyArg::Fail),
            interval: Some(Duration::from_millis(250)),
            db: Some("/tmp/xsync/users.json".into()),
            snapshots: None,
            defaults: UserDefaultArgs {
                level: Some(2),
                flow: None,
            },
        }
    }

    #[test]
    fn sync_flags_override_file_values() {
        let mut cfg = Config::default();
        apply_sync(&mut cfg, &sync_args());

        let sync = cfg.sync_config().expect("valid sync config");
        assert_eq!(sync.mode, SyncMode::Upsert);
        assert!(sync.reseed);
        assert_eq!(sync.concurrency, 32);
        assert_eq!(sync.retry.attempts, 5);
        assert_eq!(sync.idempotency, IdempotencyPolicy::Fail);

        // sub-second intervals round up to one second
        assert_eq!(cfg.interval(), Some(Duration::from_secs(1)));
        assert_eq!(cfg.storage.db, PathBuf::from("/tmp/xsync/users.json"));
        assert_eq!(cfg.defaults.level, 2);
        assert_eq!(cfg.feed.server_id.as_deref(), Some("srv-1"));
    }

    #[test]
    fn absent_flags_keep_file_values() {
        let mut cfg = Config::default();
        cfg.sync.mode = "upsert".into();
        cfg.defaults.flow = "xtls-rprx-vision".into();

        apply_sync(
            &mut cfg,
            &SyncArgs {
                feed_url: None,
                token: None,
                server_id: None,
                mode: None,
                reseed: false,
                concurrency: None,
                retries: None,
                idempotency: None,
                interval: None,
                db: None,
                snapshots: None,
                defaults: UserDefaultArgs {
                    level: None,
                    flow: None,
                },
            },
        );

        assert_eq!(cfg.sync.mode, "upsert");
        assert_eq!(cfg.defaults.flow, "xtls-rprx-vision");
        assert_eq!(cfg.interval(), None);
    }

    #[test]
    fn global_flags_override_xray_section() {
        let mut cfg = Config::default();
        let global = GlobalOpts {
            xray: Some("10.0.0.2:8080".into()),
            timeout: Some(3),
            config: None,
            output: crate::cli::OutputFormat::Table,
            verbose: 0,
            quiet: false,
        };
        apply_global(&mut cfg, &global);

        let xray = cfg.xray_config();
        assert_eq!(xray.address, "10.0.0.2:8080");
        assert_eq!(xray.timeout, Duration::from_secs(3));
    }
}
