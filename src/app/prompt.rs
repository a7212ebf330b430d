use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};

use crate::app::error::AppError;
use crate::app::network::is_valid_address_input;

/// Interactive choices made by the user. Handlers go through this so tests can script answers.
pub trait Prompter {
    fn select(&self, prompt: &str, items: &[String]) -> Result<usize, AppError>;

    fn input_address(&self, prompt: &str) -> Result<String, AppError>;

    fn notice(&self, message: &str);
}

pub struct TerminalPrompter {
    trace_id: String,
}

impl TerminalPrompter {
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
        }
    }

    fn prompt_error(&self, err: dialoguer::Error) -> AppError {
        AppError::validation(
            format!("Interactive prompt failed ({err}). Pass the value as a flag instead."),
            &self.trace_id,
        )
    }
}

impl Prompter for TerminalPrompter {
    fn select(&self, prompt: &str, items: &[String]) -> Result<usize, AppError> {
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact()
            .map_err(|err| self.prompt_error(err))
    }

    fn input_address(&self, prompt: &str) -> Result<String, AppError> {
        Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .validate_with(|value: &String| -> Result<(), &str> {
                if is_valid_address_input(value) {
                    Ok(())
                } else {
                    Err("Enter an IPv4 address like 192.168.1.12 or 192.168.1.12:5555")
                }
            })
            .interact_text()
            .map_err(|err| self.prompt_error(err))
    }

    fn notice(&self, message: &str) {
        eprintln!("{message}");
    }
}
