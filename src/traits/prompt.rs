//! Operator prompt abstraction for the interactive authorization grant.

use std::io;

/// Shows the authorization URL and reads back the callback URL.
///
/// The grant flow only ever talks to the operator through this trait, so
/// tests can script the pasted responses.
pub trait Prompt {
    /// Present the URL the operator must visit.
    fn show_authorization_url(&mut self, url: &str);

    /// Tell the operator their previous answer was rejected.
    fn reject(&mut self, message: &str);

    /// Read one line of input (the callback URL) from the operator.
    fn read_callback(&mut self) -> io::Result<String>;
}
