pub mod fetch;
pub mod raw;
pub mod status;

pub use fetch::{FetchCommands, handle_fetch_command};
pub use raw::{RawCommands, handle_raw_command};
pub use status::{StatusCommands, handle_status_command};
