use anyhow::{Context, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use tracing::debug;

pub(crate) trait Prompt {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;
}

#[derive(Clone, Debug)]
pub(crate) struct DialoguerPrompt;

/// Answers every question with its default without touching stdin.
#[derive(Clone, Debug)]
pub(crate) struct NonInteractivePrompt;

impl Prompt for DialoguerPrompt {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(default)
            .interact()
            .with_context(|| format!("failed to read an answer for '{prompt}'"))
    }
}

impl Prompt for NonInteractivePrompt {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        debug!(prompt, answer = default, "non-interactive; using default answer");
        Ok(default)
    }
}

pub(crate) fn prompt_for(non_interactive: bool) -> Box<dyn Prompt> {
    if non_interactive {
        Box::new(NonInteractivePrompt)
    } else {
        Box::new(DialoguerPrompt)
    }
}
