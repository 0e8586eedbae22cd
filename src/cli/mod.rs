// CLI module
// Public interface for the terminal shell

mod commands;
mod repl;

pub use commands::{format_help, Command};
pub use repl::{run_once, Repl};
