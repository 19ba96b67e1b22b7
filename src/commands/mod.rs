// ABOUTME: Command handlers behind the CLI subcommands.
// ABOUTME: Each handler returns the process exit code.

mod cancel;
mod deploy;
mod list;
mod status;

pub use cancel::cancel;
pub use deploy::deploy;
pub use list::list;
pub use status::status;
