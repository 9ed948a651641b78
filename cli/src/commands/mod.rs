mod export;
mod helpers;
mod history;
mod sync;

pub(crate) use export::cmd_export;
pub(crate) use helpers::parse_time;
pub(crate) use history::cmd_history;
pub(crate) use sync::{cmd_schedule, cmd_sync};
