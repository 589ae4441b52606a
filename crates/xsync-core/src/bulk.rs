// ── Bulk CSV import ──
//
// Rows are `email,uuid[,protocol[,level[,flow]]]` with no header. `#` lines
// are comments. Blank optional fields fall back to the defaults, and a blank
// protocol to the caller's default protocol. Bad rows are collected and
// reported, never fatal.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;

use crate::config::UserDefaults;
use crate::error::CoreError;
use crate::model::{Protocol, User};

/// A row that could not be turned into a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    /// 1-based line number in the input.
    pub line: u64,
    pub reason: String,
}

/// Result of parsing a bulk file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkImport {
    pub users: Vec<User>,
    pub rejected: Vec<RejectedRow>,
}

/// Parse a bulk file from disk.
pub fn read_csv_file(
    path: &Path,
    protocol: Protocol,
    defaults: &UserDefaults,
) -> Result<BulkImport, CoreError> {
    let file = File::open(path).map_err(|e| CoreError::Csv {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_csv(file, protocol, defaults).map_err(|e| match e {
        CoreError::Csv { reason, .. } => CoreError::Csv {
            path: path.to_path_buf(),
            reason,
        },
        other => other,
    })
}

/// Parse bulk rows from any reader. Rows without a protocol get `protocol`.
pub fn parse_csv<R: Read>(
    reader: R,
    protocol: Protocol,
    defaults: &UserDefaults,
) -> Result<BulkImport, CoreError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(Trim::All)
        .from_reader(reader);

    let mut import = BulkImport::default();
    let mut seen = HashSet::new();

    for record in rdr.records() {
        let record = record.map_err(|e| CoreError::Csv {
            path: "<input>".into(),
            reason: e.to_string(),
        })?;
        let line = record.position().map_or(0, csv::Position::line);

        match parse_row(&record, protocol, defaults) {
            Ok(None) => {}
            Ok(Some(user)) => {
                if seen.insert(user.id.clone()) {
                    import.users.push(user);
                } else {
                    import.rejected.push(RejectedRow {
                        line,
                        reason: format!("duplicate email '{}'", user.id),
                    });
                }
            }
            Err(reason) => import.rejected.push(RejectedRow { line, reason }),
        }
    }

    Ok(import)
}

/// `Ok(None)` for a blank row.
fn parse_row(
    record: &StringRecord,
    default_protocol: Protocol,
    defaults: &UserDefaults,
) -> Result<Option<User>, String> {
    let field = |i: usize| record.get(i).unwrap_or("");

    if record.iter().all(str::is_empty) {
        return Ok(None);
    }

    let email = field(0);
    let secret = field(1);
    if email.is_empty() || secret.is_empty() {
        return Err("email and uuid are required".into());
    }

    let protocol = match field(2) {
        "" => default_protocol,
        raw => Protocol::from_str(raw).map_err(|_| format!("unknown protocol '{raw}'"))?,
    };

    let level = match field(3) {
        "" => defaults.level,
        raw => raw
            .parse::<u32>()
            .map_err(|_| format!("invalid level '{raw}'"))?,
    };

    let user = match protocol {
        Protocol::Vless => {
            let flow = match field(4) {
                "" => defaults.flow.as_str(),
                raw => raw,
            };
            User::vless(email, secret, level, flow)
        }
        Protocol::Vmess => User::vmess(email, secret, level),
    };
    Ok(Some(user))
}
