//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Mask the plaintext feed token, if one is configured.
fn redact(cfg: &mut Config) {
    if cfg.feed.token.as_deref().is_some_and(|t| !t.is_empty()) {
        cfg.feed.token = Some("****".into());
    }
}

fn to_toml(cfg: &Config) -> String {
    toml::to_string_pretty(cfg).unwrap_or_else(|e| format!("# cannot render config: {e}"))
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            let path = config::resolved_path(global);
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let mut cfg = config::load(global)?;
            redact(&mut cfg);
            let out = output::render_single(global.output, &cfg, to_toml, to_toml);
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            let path = config::resolved_path(global);
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            config::save_config(&Config::default(), &path)?;
            output::print_output(&format!("wrote {}", path.display()), global.quiet);
            Ok(())
        }
    }
}
