//! Checklist through `dialog` or `whiptail`.

use anyhow::{Result, bail};
use log::debug;

use super::{ChecklistRequest, Chooser};
use crate::error::PurgeError;
use crate::runtime::Runtime;

const MIN_ROWS: u16 = 10;
const MIN_COLS: u16 = 40;
const MAX_WIDTH: u16 = 100;
/// Rows taken by the box border, title and buttons.
const CHROME_ROWS: u16 = 7;

/// Exit codes of dialog/whiptail meaning "no answer".
const CANCEL_CODES: &[i32] = &[1, 255];

pub struct DialogChooser<'a, R: Runtime> {
    runtime: &'a R,
    program: &'static str,
}

impl<'a, R: Runtime> DialogChooser<'a, R> {
    pub fn new(runtime: &'a R, program: &'static str) -> Self {
        Self { runtime, program }
    }

    /// Compute the dialog geometry `(height, width, list height)`.
    fn geometry(&self, request: &ChecklistRequest) -> Result<(u16, u16, u16)> {
        let Some((rows, cols)) = self.runtime.terminal_size() else {
            bail!("The interactive checklist needs a terminal; use --interface terminal or drop --choose");
        };
        if rows < MIN_ROWS || cols < MIN_COLS {
            return Err(PurgeError::TerminalTooSmall { rows, cols }.into());
        }

        let width = (cols - 4).min(MAX_WIDTH);
        let text_rows = request
            .text
            .lines()
            .map(|line| (line.chars().count() as u16 / width.saturating_sub(4).max(1)) + 1)
            .sum::<u16>();
        let items = request.items.len().min(u16::MAX as usize) as u16;

        let available = rows.saturating_sub(2 + CHROME_ROWS + text_rows);
        if available == 0 {
            return Err(PurgeError::TerminalTooSmall { rows, cols }.into());
        }
        let list_height = items.min(available);
        let height = list_height + CHROME_ROWS + text_rows;
        Ok((height, width, list_height))
    }

    fn args(&self, request: &ChecklistRequest) -> Result<Vec<String>> {
        let (height, width, list_height) = self.geometry(request)?;

        let mut args = vec![
            "--title".to_string(),
            request.title.clone(),
            "--separate-output".to_string(),
            "--checklist".to_string(),
            request.text.clone(),
            height.to_string(),
            width.to_string(),
            list_height.to_string(),
        ];
        for item in &request.items {
            args.push(item.tag.clone());
            args.push(item.label.clone());
            args.push(if item.selected { "on" } else { "off" }.to_string());
        }
        Ok(args)
    }
}

impl<R: Runtime> Chooser for DialogChooser<'_, R> {
    #[tracing::instrument(skip(self, request))]
    fn checklist(&self, request: &ChecklistRequest) -> Result<Option<Vec<String>>> {
        let args = self.args(request)?;
        let output = self.runtime.run_dialog(self.program, &args)?;

        match output.code {
            Some(0) => {
                let tags: Vec<String> = output
                    .stderr
                    .lines()
                    .map(|line| line.trim().trim_matches('"'))
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect();
                debug!("{} returned {} tag(s)", self.program, tags.len());
                Ok(Some(tags))
            }
            Some(code) if CANCEL_CODES.contains(&code) => Ok(None),
            code => bail!(
                "{} failed ({:?}): {}",
                self.program,
                code,
                output.stderr.trim()
            ),
        }
    }
}
