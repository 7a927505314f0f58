use std::io::Write;

use owo_colors::OwoColorize;
use scholara_core::{Contributor, Subject};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

pub fn print_subjects(
    w: &mut dyn Write,
    subjects: &[Subject],
    color: ColorMode,
) -> std::io::Result<()> {
    if subjects.is_empty() {
        writeln!(w, "No subjects")?;
        return Ok(());
    }
    for s in subjects {
        if color.enabled() {
            writeln!(w, "{}  {} {}", s.value.bold(), s.label, format!("({})", s.category).dimmed())?;
        } else {
            writeln!(w, "{}  {} ({})", s.value, s.label, s.category)?;
        }
    }
    Ok(())
}

pub fn print_contributors(
    w: &mut dyn Write,
    contributors: &[Contributor],
    color: ColorMode,
) -> std::io::Result<()> {
    if contributors.is_empty() {
        writeln!(w, "No contributors")?;
        return Ok(());
    }
    for (rank, c) in contributors.iter().enumerate() {
        let name = c
            .name
            .as_deref()
            .or(c.email.as_deref())
            .unwrap_or(&c.user_id);
        if color.enabled() {
            writeln!(
                w,
                "{:>3}. {} {}",
                rank + 1,
                name.bold(),
                format!("[{}]", c.contribution_count).cyan()
            )?;
        } else {
            writeln!(w, "{:>3}. {} [{}]", rank + 1, name, c.contribution_count)?;
        }
    }
    Ok(())
}
