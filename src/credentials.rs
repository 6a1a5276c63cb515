//! User credentials for credential-based sessions.
//!
//! Credentials are held only for the duration of one `authenticate` call and
//! are never written anywhere. The password is redacted from `Debug` output.
//!
//! The production source is [`Prompt`], which asks for whatever was not
//! supplied up front. On a terminal the password is typed without echo.
//! There is no built-in fallback account.

use std::{io, sync::Arc};

use async_trait::async_trait;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal,
};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};
use veil::Redact;

use crate::{error::Error, session::EstablishError};

/// Username and password for one authentication.
#[derive(Clone, PartialEq, Eq, Redact)]
pub struct Credentials {
    username: String,

    #[redact]
    password: String,
}

impl Credentials {
    /// Creates credentials from non-empty fields.
    ///
    /// # Errors
    ///
    /// Returns [`EstablishError::EmptyCredentials`] if either field is empty.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, EstablishError> {
        let username = username.into();
        let password = password.into();
        if username.is_empty() || password.is_empty() {
            return Err(EstablishError::EmptyCredentials);
        }

        Ok(Self { username, password })
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

/// Source of credentials for a credential-based session.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Acquires credentials.
    ///
    /// # Errors
    ///
    /// * [`EstablishError::AuthCanceled`] if the user backs out
    /// * [`EstablishError::EmptyCredentials`] if a field is left empty
    async fn acquire(&self) -> Result<Credentials, EstablishError>;
}

/// Interactive credential prompt on a line-oriented input.
///
/// Pre-seeded fields (from command line or environment) are not asked for.
/// End of input at either question cancels authentication.
///
/// With [`with_hidden_password`](Self::with_hidden_password) the password is
/// read from the terminal in raw mode instead, where Escape, Ctrl-C and
/// Ctrl-D cancel.
pub struct Prompt<R, W> {
    username: Option<String>,
    password: Option<String>,
    hidden_password: bool,
    input: Arc<Mutex<R>>,
    output: Mutex<W>,
}

impl<R, W> Prompt<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Creates a prompt reading answers from `input` and writing questions
    /// to `output`.
    ///
    /// The input is shared so the caller can keep reading from it once the
    /// session is established.
    pub fn new(input: Arc<Mutex<R>>, output: W) -> Self {
        Self {
            username: None,
            password: None,
            hidden_password: false,
            input,
            output: Mutex::new(output),
        }
    }

    #[must_use]
    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }

    #[must_use]
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    /// Reads the password from the controlling terminal without echoing it,
    /// bypassing the input. Only meaningful when the input is that terminal.
    #[must_use]
    pub fn with_hidden_password(mut self, hidden: bool) -> Self {
        self.hidden_password = hidden;
        self
    }

    async fn say(&self, text: &str) -> Result<(), EstablishError> {
        let mut output = self.output.lock().await;
        output
            .write_all(text.as_bytes())
            .await
            .map_err(Error::from)?;
        output.flush().await.map_err(Error::from)?;
        Ok(())
    }

    /// Asks `question` and returns the answer without its line ending, or
    /// `None` at end of input.
    async fn ask(&self, question: &str) -> Result<Option<String>, EstablishError> {
        self.say(question).await?;

        let mut line = String::new();
        let read = self
            .input
            .lock()
            .await
            .read_line(&mut line)
            .await
            .map_err(Error::from)?;
        if read == 0 {
            return Ok(None);
        }

        Ok(Some(line.trim_end_matches(['\r', '\n']).to_owned()))
    }

    /// Like [`ask`](Self::ask), but the answer is typed without echo.
    /// `None` if the user cancels.
    async fn ask_hidden(&self, question: &str) -> Result<Option<String>, EstablishError> {
        self.say(question).await?;

        // Hold the input so nothing else reads the terminal meanwhile.
        let _input = self.input.lock().await;
        let answer = tokio::task::spawn_blocking(read_hidden_line)
            .await
            .map_err(Error::internal)?
            .map_err(Error::from)?;

        self.say("\n").await?;
        Ok(answer)
    }
}

/// Progress of typing a hidden answer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Typing {
    Pending,
    Submitted,
    Cancelled,
}

/// Applies one key event to the answer typed so far.
fn edit(answer: &mut String, key: KeyEvent) -> Typing {
    if key.kind == KeyEventKind::Release {
        return Typing::Pending;
    }

    match key.code {
        KeyCode::Enter => Typing::Submitted,
        KeyCode::Esc => Typing::Cancelled,
        KeyCode::Char('c' | 'd') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Typing::Cancelled
        }
        KeyCode::Backspace => {
            answer.pop();
            Typing::Pending
        }
        KeyCode::Char(c) => {
            answer.push(c);
            Typing::Pending
        }
        _ => Typing::Pending,
    }
}

/// Puts the terminal in raw mode until dropped.
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Reads a line from the terminal without echo. Blocks.
fn read_hidden_line() -> io::Result<Option<String>> {
    let _raw = RawMode::enable()?;

    let mut answer = String::new();
    loop {
        if let Event::Key(key) = event::read()? {
            match edit(&mut answer, key) {
                Typing::Pending => {}
                Typing::Submitted => return Ok(Some(answer)),
                Typing::Cancelled => return Ok(None),
            }
        }
    }
}

#[async_trait]
impl<R, W> CredentialSource for Prompt<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn acquire(&self) -> Result<Credentials, EstablishError> {
        let username = match &self.username {
            Some(username) => username.clone(),
            None => self
                .ask("Username: ")
                .await?
                .ok_or(EstablishError::AuthCanceled)?
                .trim()
                .to_owned(),
        };

        let password = match &self.password {
            Some(password) => password.clone(),
            None if self.hidden_password => self
                .ask_hidden("Password: ")
                .await?
                .ok_or(EstablishError::AuthCanceled)?,
            None => self
                .ask("Password: ")
                .await?
                .ok_or(EstablishError::AuthCanceled)?,
        };

        Credentials::new(username, password)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn prompt(input: &str) -> Prompt<Cursor<Vec<u8>>, Vec<u8>> {
        let input = Arc::new(Mutex::new(Cursor::new(input.as_bytes().to_vec())));
        Prompt::new(input, Vec::new())
    }

    #[tokio::test]
    async fn reads_both_fields() {
        let credentials = prompt("alice\nhunter2\r\n").acquire().await.unwrap();
        assert_eq!(credentials.username(), "alice");
        assert_eq!(credentials.password(), "hunter2");
    }

    #[tokio::test]
    async fn preset_fields_are_not_asked() {
        let prompt = prompt("hunter2\n").with_username(Some("alice".to_owned()));
        let credentials = prompt.acquire().await.unwrap();
        assert_eq!(credentials.username(), "alice");
        assert_eq!(credentials.password(), "hunter2");
        assert_eq!(prompt.output.lock().await.as_slice(), b"Password: ");
    }

    #[tokio::test]
    async fn empty_password_is_rejected() {
        let err = prompt("alice\n\n").acquire().await.unwrap_err();
        assert!(matches!(err, EstablishError::EmptyCredentials));
    }

    #[tokio::test]
    async fn end_of_input_cancels() {
        let err = prompt("alice\n").acquire().await.unwrap_err();
        assert!(matches!(err, EstablishError::AuthCanceled));

        let err = prompt("").acquire().await.unwrap_err();
        assert!(matches!(err, EstablishError::AuthCanceled));
    }

    fn press(answer: &mut String, code: KeyCode) -> Typing {
        edit(answer, KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn hidden_typing_submits_on_enter() {
        let mut answer = String::new();
        for c in "hunter3".chars() {
            assert_eq!(press(&mut answer, KeyCode::Char(c)), Typing::Pending);
        }
        assert_eq!(press(&mut answer, KeyCode::Backspace), Typing::Pending);
        assert_eq!(press(&mut answer, KeyCode::Char('2')), Typing::Pending);
        assert_eq!(press(&mut answer, KeyCode::Left), Typing::Pending);
        assert_eq!(press(&mut answer, KeyCode::Enter), Typing::Submitted);
        assert_eq!(answer, "hunter2");
    }

    #[test]
    fn hidden_typing_ignores_key_releases() {
        let mut answer = String::new();
        let mut release = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(edit(&mut answer, release), Typing::Pending);
        assert!(answer.is_empty());
    }

    #[test]
    fn hidden_typing_cancels() {
        let mut answer = String::from("hun");
        assert_eq!(press(&mut answer, KeyCode::Esc), Typing::Cancelled);

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(edit(&mut answer, ctrl_c), Typing::Cancelled);
        let ctrl_d = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL);
        assert_eq!(edit(&mut answer, ctrl_d), Typing::Cancelled);
        assert_eq!(answer, "hun");
    }

    #[test]
    fn password_is_redacted() {
        let credentials = Credentials::new("alice", "hunter2").unwrap();
        let debug = format!("{credentials:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }
}
