// Library interface for helpdesk-cli, used by the integration tests.
// commands.rs and view.rs are also declared in main.rs, so the path
// attribute points both crates at the same source file.

#[path = "commands.rs"]
pub mod commands;

#[path = "view.rs"]
pub mod view;

pub use commands::{handle_command, CommandResult};
pub use view::{format_summary, TerminalView};
