//! Scripted operator prompt for testing the authorization grant.

use std::collections::VecDeque;
use std::io;

use reqwest::Url;

use crate::traits::Prompt;

/// A prompt that replays fixed answers, recording what it was shown.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    /// URLs passed to [`Prompt::show_authorization_url`].
    pub shown: Vec<String>,
    /// Messages passed to [`Prompt::reject`].
    pub rejections: Vec<String>,
    approve_with: Option<String>,
}

impl ScriptedPrompt {
    /// Create a prompt that answers with `answers` in order.
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            shown: Vec::new(),
            rejections: Vec::new(),
            approve_with: None,
        }
    }

    /// Create a prompt that approves every authorization URL it is shown,
    /// answering with its redirect URI, `code` and the URL's own `state`.
    pub fn approving(code: impl Into<String>) -> Self {
        Self {
            approve_with: Some(code.into()),
            ..Self::default()
        }
    }

    /// Queue another answer.
    pub fn push_answer(&mut self, answer: impl Into<String>) {
        self.answers.push_back(answer.into());
    }
}

impl Prompt for ScriptedPrompt {
    fn show_authorization_url(&mut self, url: &str) {
        self.shown.push(url.to_string());

        let Some(code) = &self.approve_with else {
            return;
        };
        let Ok(parsed) = Url::parse(url) else {
            return;
        };
        let param = |name: &str| {
            parsed
                .query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
                .unwrap_or_default()
        };
        let mut callback = param("redirect_uri");
        callback.push_str(&format!("?code={}&state={}", code, param("state")));
        self.answers.push_back(callback);
    }

    fn reject(&mut self, message: &str) {
        self.rejections.push(message.to_string());
    }

    fn read_callback(&mut self) -> io::Result<String> {
        self.answers.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted answer left")
        })
    }
}
