//! Version reporting.

/// The current version of Ocarina, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `User-Agent` header value sent with every request.
pub fn user_agent() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), VERSION)
}

/// Handle the `version` command.
pub fn handle_version_command() {
    println!("{}", user_agent());
}
