//! `TerminalReporter`: the terminal implementation of `ProgressReporter`.
//!
//! - `step()` prints `→ message`
//! - `tick()` starts or advances a spinner for the current step (TTY only)
//! - `success()` finishes the spinner with `✓ message`
//! - `warn()` clears the spinner and prints `! message`
//!
//! Everything except the spinner is suppressed when `ctx.quiet`.

use std::sync::Mutex;

use indicatif::ProgressBar;
use owo_colors::OwoColorize as _;

use crate::application::ports::ProgressReporter;
use crate::output::{OutputContext, progress};

pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
    current: Mutex<String>,
    spinner: Mutex<Option<ProgressBar>>,
}

impl<'a> TerminalReporter<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self {
            ctx,
            current: Mutex::new(String::new()),
            spinner: Mutex::new(None),
        }
    }

    fn take_spinner(&self) -> Option<ProgressBar> {
        self.spinner.lock().ok()?.take()
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        if let Some(pb) = self.take_spinner() {
            pb.finish_and_clear();
        }
        if let Ok(mut current) = self.current.lock() {
            message.clone_into(&mut *current);
        }
        if !self.ctx.quiet {
            println!("  {} {message}", "→".style(self.ctx.styles.accent));
        }
    }

    fn tick(&self) {
        if !self.ctx.show_progress() {
            return;
        }
        let Ok(mut spinner) = self.spinner.lock() else {
            return;
        };
        let pb = spinner.get_or_insert_with(|| {
            let label = self
                .current
                .lock()
                .map(|c| c.trim_end_matches("...").to_string())
                .unwrap_or_default();
            progress::poll_spinner(&format!("waiting: {label}"))
        });
        pb.inc(1);
    }

    fn success(&self, message: &str) {
        match self.take_spinner() {
            Some(pb) => progress::finish_ok(&pb, message),
            None if !self.ctx.quiet => {
                println!("  {} {message}", "✓".style(self.ctx.styles.success));
            }
            None => {}
        }
    }

    fn warn(&self, message: &str) {
        if let Some(pb) = self.take_spinner() {
            pb.finish_and_clear();
        }
        if !self.ctx.quiet {
            println!("  {} {message}", "!".style(self.ctx.styles.warning));
        }
    }
}
