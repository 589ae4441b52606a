//! Command handlers, one module per subcommand group.

pub mod bulk;
pub mod config_cmd;
pub mod sync;
pub mod users;

mod util;
