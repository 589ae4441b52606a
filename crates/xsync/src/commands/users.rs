//! Single-user command handlers: `add` and `del`.

use tracing::warn;

use xsync_core::{Protocol, User, UserDefaults, ops};

use crate::cli::{AddArgs, DelArgs, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output::{self, OpReport};

use super::util;

// ── Handlers ────────────────────────────────────────────────────────

pub async fn add(args: &AddArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load(global)?;
    config::apply_policy(&mut cfg, &args.policy);
    config::apply_user_defaults(&mut cfg, &args.defaults);

    let policy = util::op_policy(&cfg)?;
    let user = build_user(args, &cfg.user_defaults())?;
    let store = util::open_store(args.target.store.as_deref())?;
    let client = util::connect(&cfg, &args.target.tags).await?;

    let outcome = ops::add_user(&client, &user, policy, store.as_ref()).await?;

    let report = OpReport {
        op: "add",
        id: user.id,
        outcome: output::outcome_label(outcome),
        tags: client.tags().to_vec(),
        store: store.map(|s| s.path().display().to_string()),
    };
    output::print_output(&output::render_op(global.output, &report), global.quiet);
    Ok(())
}

pub async fn del(args: &DelArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load(global)?;
    config::apply_policy(&mut cfg, &args.policy);

    let id = required("email", &args.email)?;
    let policy = util::op_policy(&cfg)?;
    let store = util::open_store(args.target.store.as_deref())?;
    let client = util::connect(&cfg, &args.target.tags).await?;

    let outcome = ops::remove_user(&client, &id, policy, store.as_ref()).await?;

    let report = OpReport {
        op: "del",
        id,
        outcome: output::outcome_label(outcome),
        tags: client.tags().to_vec(),
        store: store.map(|s| s.path().display().to_string()),
    };
    output::print_output(&output::render_op(global.output, &report), global.quiet);
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────────

fn required(field: &str, value: &str) -> Result<String, CliError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CliError::Validation {
            field: field.into(),
            reason: "must not be blank".into(),
        });
    }
    Ok(value.to_owned())
}

/// Build the user record from flags, filling level and flow from defaults.
fn build_user(args: &AddArgs, defaults: &UserDefaults) -> Result<User, CliError> {
    let id = required("email", &args.email)?;
    let secret = required("uuid", &args.uuid)?;

    Ok(match config::protocol(args.proto) {
        Protocol::Vless => User::vless(id, secret, defaults.level, defaults.flow.as_str()),
        Protocol::Vmess => {
            if !defaults.flow.is_empty() {
                warn!(flow = %defaults.flow, "vmess accounts carry no flow; ignoring it");
            }
            User::vmess(id, secret, defaults.level)
        }
    })
}

#[cfg(test)]
mod tests {
    use crate::cli::{PolicyArgs, ProtocolArg, TargetArgs, UserDefaultArgs};

    use super::*;

    fn add_args(proto: ProtocolArg, email: &str, uuid: &str) -> AddArgs {
        AddArgs {
            email: email.into(),
            uuid: uuid.into(),
            proto,
            defaults: UserDefaultArgs {
                level: None,
                flow: None,
            },
            target: TargetArgs {
                tags: vec!["in-1".into()],
                store: None,
            },
            policy: PolicyArgs {
                idempotency: None,
                retries: None,
            },
        }
    }

    fn vision() -> UserDefaults {
        UserDefaults {
            level: 1,
            flow: "xtls-rprx-vision".into(),
        }
    }

    #[test]
    fn vless_user_takes_default_flow() {
        let user = build_user(&add_args(ProtocolArg::Vless, " a@x ", "u-1"), &vision())
            .expect("valid user");
        assert_eq!(user.id, "a@x");
        assert_eq!(user.level, 1);
        assert_eq!(user.flow, "xtls-rprx-vision");
    }

    #[test]
    fn vmess_user_drops_flow() {
        let user =
            build_user(&add_args(ProtocolArg::Vmess, "a@x", "u-1"), &vision()).expect("valid user");
        assert_eq!(user.protocol, Protocol::Vmess);
        assert!(user.flow.is_empty());
    }

    #[test]
    fn blank_uuid_is_rejected() {
        let err = build_user(&add_args(ProtocolArg::Vless, "a@x", "  "), &vision())
            .expect_err("blank uuid");
        assert!(matches!(err, CliError::Validation { ref field, .. } if field == "uuid"));
    }
}
