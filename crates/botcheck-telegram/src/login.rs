//! One-time session bootstrap: phone number, login code, optional 2FA password.

use std::io::{self, BufRead, Write};

use grammers_client::SignInError;
use tracing::info;

use crate::client::{open_client, save_session};
use crate::config::TelegramConfig;
use crate::error::{TelegramError, TelegramResult};

/// Source of interactive answers during login.
pub trait Prompt {
    /// Shows `question` and returns the trimmed answer.
    fn ask(&mut self, question: &str) -> io::Result<String>;
}

/// Reads answers from standard input.
#[derive(Debug, Default)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{question}")?;
        stdout.flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

/// How a login attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The session file already holds a valid authorization.
    AlreadyAuthorized,
    /// A new authorization was created and saved.
    SignedIn { user_id: i64 },
}

/// Signs the session in, asking `prompt` for the phone, code, and password.
pub async fn login<P: Prompt>(
    config: &TelegramConfig,
    prompt: &mut P,
) -> TelegramResult<LoginOutcome> {
    let client = open_client(config).await?;
    let authorized = client
        .is_authorized()
        .await
        .map_err(|e| TelegramError::Invocation(e.to_string()))?;
    if authorized {
        return Ok(LoginOutcome::AlreadyAuthorized);
    }

    let phone = prompt
        .ask("Phone number (international format): ")
        .map_err(TelegramError::Prompt)?;
    let token = client
        .request_login_code(&phone)
        .await
        .map_err(|e| TelegramError::SignIn(e.to_string()))?;
    let code = prompt.ask("Login code: ").map_err(TelegramError::Prompt)?;

    let user = match client.sign_in(&token, &code).await {
        Ok(user) => user,
        Err(SignInError::PasswordRequired(password_token)) => {
            let question = match password_token.hint() {
                Some(hint) => format!("Two-step verification password (hint: {hint}): "),
                None => "Two-step verification password: ".to_string(),
            };
            let password = prompt.ask(&question).map_err(TelegramError::Prompt)?;
            client
                .check_password(password_token, password.trim())
                .await
                .map_err(|e| TelegramError::SignIn(e.to_string()))?
        }
        Err(e) => return Err(TelegramError::SignIn(e.to_string())),
    };

    save_session(&client, &config.session_file)?;
    info!(session = %config.session_file.display(), "session saved");
    Ok(LoginOutcome::SignedIn { user_id: user.id() })
}
