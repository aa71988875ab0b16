//! Checklist drawn in the terminal without external programs.

use anyhow::{Context, Result};
use dialoguer::MultiSelect;
use dialoguer::theme::ColorfulTheme;

use super::{ChecklistItem, ChecklistRequest, Chooser};

pub struct TerminalChooser;

fn row(item: &ChecklistItem) -> String {
    if item.label.is_empty() {
        item.tag.clone()
    } else {
        format!("{}  ({})", item.tag, item.label)
    }
}

impl Chooser for TerminalChooser {
    fn checklist(&self, request: &ChecklistRequest) -> Result<Option<Vec<String>>> {
        let rows: Vec<String> = request.items.iter().map(row).collect();
        let defaults: Vec<bool> = request.items.iter().map(|i| i.selected).collect();

        println!("{}", request.title);
        let chosen = MultiSelect::with_theme(&ColorfulTheme::default())
            .with_prompt(&request.text)
            .items(&rows)
            .defaults(&defaults)
            .interact_opt()
            .context("showing the terminal checklist")?;

        Ok(chosen.map(|indices| {
            indices
                .into_iter()
                .map(|i| request.items[i].tag.clone())
                .collect()
        }))
    }
}
