//! Terminal implementation of the operator prompt.

use std::io::{self, BufRead, Write};

use crate::traits::Prompt;

/// Prompts on stdout and reads the callback URL from stdin.
#[derive(Debug, Default)]
pub struct TerminalPrompt {
    open_browser: bool,
}

impl TerminalPrompt {
    /// Create a terminal prompt. With `open_browser`, the authorization URL
    /// is also handed to the system browser.
    pub fn new(open_browser: bool) -> Self {
        Self { open_browser }
    }
}

impl Prompt for TerminalPrompt {
    fn show_authorization_url(&mut self, url: &str) {
        println!("Please request a grant via:");
        println!("{}", url);

        if self.open_browser && open::that(url).is_ok() {
            println!("Browser opened automatically.");
        }
    }

    fn reject(&mut self, message: &str) {
        println!("***\n{}\n***\n", message);
    }

    fn read_callback(&mut self) -> io::Result<String> {
        println!("Enter the full callback URL as seen in your browser window");
        io::stdout().flush().ok();

        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stdin closed before a callback URL was entered",
            ));
        }
        Ok(line.trim().to_string())
    }
}
