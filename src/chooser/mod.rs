//! Interactive checklist front ends.
//!
//! A [`Chooser`] shows a list of `(tag, label, preselected)` rows and returns
//! the tags the user confirmed, or None when the user cancelled.

mod dialog;
mod terminal;

use anyhow::{Result, bail};
use log::debug;
use serde::Serialize;

use crate::runtime::Runtime;

pub use dialog::DialogChooser;
pub use terminal::TerminalChooser;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChecklistItem {
    pub tag: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChecklistRequest {
    pub title: String,
    pub text: String,
    pub items: Vec<ChecklistItem>,
}

#[cfg_attr(test, mockall::automock)]
pub trait Chooser {
    /// Show the checklist. Returns the confirmed tags, None on cancel.
    fn checklist(&self, request: &ChecklistRequest) -> Result<Option<Vec<String>>>;
}

/// Checklist front end selectable with `--interface`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize)]
pub enum Interface {
    Dialog,
    Whiptail,
    Terminal,
}

impl Interface {
    /// External program implementing the interface, if any.
    pub fn program(&self) -> Option<&'static str> {
        match self {
            Interface::Dialog => Some("dialog"),
            Interface::Whiptail => Some("whiptail"),
            Interface::Terminal => None,
        }
    }

    /// Use the requested interface, or the first one available:
    /// dialog, whiptail, then the plain terminal. Full-screen programs are
    /// skipped on terminals without cursor addressing.
    pub fn resolve<R: Runtime>(runtime: &R, requested: Option<Interface>) -> Result<Interface> {
        if let Some(interface) = requested {
            if let Some(program) = interface.program()
                && runtime.which(program).is_none()
            {
                bail!("{} is not installed; choose another --interface", program);
            }
            return Ok(interface);
        }

        let term = runtime.env_var("TERM").unwrap_or_default();
        if term.is_empty() || term == "dumb" {
            debug!("TERM is {:?}, using the terminal interface", term);
            return Ok(Interface::Terminal);
        }

        let detected = [Interface::Dialog, Interface::Whiptail]
            .into_iter()
            .find(|i| i.program().is_some_and(|p| runtime.which(p).is_some()))
            .unwrap_or(Interface::Terminal);
        debug!("Using {:?} interface", detected);
        Ok(detected)
    }
}

/// Build the chooser for an interface.
pub fn build_chooser<'a, R: Runtime>(runtime: &'a R, interface: Interface) -> Box<dyn Chooser + 'a> {
    match interface.program() {
        Some(program) => Box::new(DialogChooser::new(runtime, program)),
        None => Box::new(TerminalChooser),
    }
}
