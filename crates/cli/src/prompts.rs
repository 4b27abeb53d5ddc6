//! Interactive confirmation and credential prompts.

use std::io::{stdin, stdout, BufRead, IsTerminal, Write};

use aptdeck_core::actions::PackageAction;
use aptdeck_core::credential::Secret;
use aptdeck_core::error::{Error, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

const PIPED_SECRET_CAPACITY: usize = 256;

/// The question asked before running `action`.
pub fn confirmation_question(action: &PackageAction) -> String {
    match action {
        PackageAction::Install(name) => format!("Install package: {name}?"),
        PackageAction::Upgrade(name) => format!("Upgrade package: {name}?"),
        PackageAction::Remove(name) => format!("Are you sure you want to remove {name}?"),
        PackageAction::UpdateIndex => "Run system update now (apt-get update)?".to_string(),
    }
}

/// Interprets a yes/no answer. Anything but an explicit yes is a no.
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Asks a yes/no question on the terminal, defaulting to no.
pub fn confirm(question: &str) -> Result<bool> {
    print!("{question} ([y]es/[N]o): ");
    stdout().flush()?;

    let mut input = String::new();
    stdin().lock().read_line(&mut input)?;

    Ok(is_yes(&input))
}

/// Prompts for a credential without echoing it.
///
/// When stdin is not a terminal the credential is read as a plain line, so
/// it can be piped in.
pub fn prompt_secret(prompt: &str) -> Result<Secret> {
    print!("{prompt}");
    stdout().flush()?;

    if !stdin().is_terminal() {
        let mut input = String::with_capacity(PIPED_SECRET_CAPACITY);
        let read = stdin().lock().read_line(&mut input);
        let value = Secret::new(input);
        read?;
        println!();
        return Ok(value.without_line_terminator());
    }

    enable_raw_mode()?;
    let read = read_hidden_line();
    disable_raw_mode()?;
    println!();

    read
}

fn read_hidden_line() -> Result<Secret> {
    let mut value = Secret::empty();

    loop {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind,
            ..
        }) = event::read()?
        else {
            continue;
        };

        if kind != KeyEventKind::Press {
            continue;
        }

        match code {
            KeyCode::Enter => return Ok(value),
            KeyCode::Backspace => {
                value.pop();
            }
            KeyCode::Esc => return Err(Error::Misc("Password entry cancelled by user".to_string())),
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                return Err(Error::Misc("Password entry cancelled by user".to_string()));
            }
            KeyCode::Char(c) => value.push(c),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_questions() {
        assert_eq!(
            confirmation_question(&PackageAction::Upgrade("nginx".to_string())),
            "Upgrade package: nginx?"
        );
        assert_eq!(
            confirmation_question(&PackageAction::Remove("nginx".to_string())),
            "Are you sure you want to remove nginx?"
        );
        assert_eq!(
            confirmation_question(&PackageAction::UpdateIndex),
            "Run system update now (apt-get update)?"
        );
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes("  YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("yep"));
    }
}
