use std::net::SocketAddr;

use clap::{Parser, Subcommand};

pub const DEFAULT_DB_URL: &str = "sqlite:courses.sqlite3?mode=rwc";
pub const DEFAULT_BIND: &str = "127.0.0.1:8000";

/// Course progress tracking server.
#[derive(Debug, Parser)]
#[command(name = "course-server", version, about)]
pub struct Cli {
    /// SQLite connection URL
    #[arg(long = "db", env = "COURSE_DB_URL", default_value = DEFAULT_DB_URL, global = true)]
    pub db_url: String,

    /// Address the HTTP server binds to
    #[arg(long, env = "COURSE_BIND", default_value = DEFAULT_BIND, global = true)]
    pub bind: SocketAddr,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Create the default admin, teacher and student accounts
    Seed,
}

impl Cli {
    #[must_use]
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Serve)
    }

    /// Default filter directive for the log subscriber.
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}
