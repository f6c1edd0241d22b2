pub mod host;
pub mod repl;
