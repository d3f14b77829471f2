//! Shared helper functions for CLI commands.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::models::{Query, Spreadsheet};
use crate::repository::DbContext;

/// Open the configured database, refusing to run before `init`.
pub fn open_database(settings: &Settings) -> anyhow::Result<DbContext> {
    if !settings.database_exists() {
        anyhow::bail!(
            "database not found at {}. Run 'menor-preco init' first.",
            settings.database_url()
        );
    }
    Ok(settings.create_db_context())
}

/// Start a spinner with a message. Call `finish_and_clear` when done.
pub fn spinner(message: impl Into<String>) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Ask a yes/no question on stdin. Anything but `y` is a no.
pub fn confirm(question: &str) -> io::Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

/// Parse a 1-based choice among `count` options.
pub fn parse_choice(input: &str, count: usize) -> Option<usize> {
    let n: usize = input.trim().parse().ok()?;
    (1..=count).contains(&n).then(|| n - 1)
}

/// Prompt until the user picks one of `count` numbered options. Returns the
/// 0-based index, or `None` on end of input.
pub fn prompt_choice(message: &str, count: usize) -> io::Result<Option<usize>> {
    let stdin = io::stdin();
    let mut input = String::new();
    loop {
        print!("{} [1-{}]: ", message, count);
        io::stdout().flush()?;
        input.clear();
        if stdin.lock().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        match parse_choice(&input, count) {
            Some(index) => return Ok(Some(index)),
            None => println!("{} Invalid number, try again", style("!").yellow()),
        }
    }
}

pub fn print_queries(queries: &[Query]) {
    println!("\n{}", style("Queries").bold());
    println!("{}", "-".repeat(78));
    println!(
        "{:<5} {:<22} {:<7} {:<18} Localities",
        "ID", "Term", "Radius", "Category"
    );
    println!("{}", "-".repeat(78));

    for query in queries {
        let category = query
            .category
            .as_ref()
            .map(|c| c.description.as_str())
            .unwrap_or("-");
        println!(
            "{:<5} {:<22} {:<7} {:<18} {}",
            query.id.map(|id| id.to_string()).unwrap_or_default(),
            truncate(&query.display_term(), 21),
            query.radius,
            truncate(category, 17),
            query.locality_names()
        );
    }
}

pub fn print_spreadsheets(spreadsheets: &[Spreadsheet]) {
    println!("\n{}", style("Spreadsheets").bold());
    println!("{}", "-".repeat(96));
    println!(
        "{:<5} {:<20} {:<10} {:<17} Link",
        "ID", "Query", "State", "Last populated"
    );
    println!("{}", "-".repeat(96));

    for spreadsheet in spreadsheets {
        let query = spreadsheet
            .query
            .as_ref()
            .map(|q| q.display_term())
            .unwrap_or_else(|| "(deleted)".to_string());
        let last = spreadsheet
            .last_populated
            .map(|dt| dt.format("%d/%m/%Y %H:%M").to_string())
            .unwrap_or_else(|| "Never".to_string());
        println!(
            "{:<5} {:<20} {:<10} {:<17} {}",
            spreadsheet.id.map(|id| id.to_string()).unwrap_or_default(),
            truncate(&query, 19),
            spreadsheet.state().as_str(),
            last,
            spreadsheet.url()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_choice_is_one_based() {
        assert_eq!(parse_choice("1", 3), Some(0));
        assert_eq!(parse_choice(" 3\n", 3), Some(2));
        assert_eq!(parse_choice("0", 3), None);
        assert_eq!(parse_choice("4", 3), None);
        assert_eq!(parse_choice("abc", 3), None);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("pizza", 10), "pizza");
        assert_eq!(truncate("São José dos Pinhais", 10), "São Jos...");
    }

    #[test]
    fn test_open_database_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::with_data_dir(PathBuf::from(dir.path()));
        let err = open_database(&settings).unwrap_err();
        assert!(err.to_string().contains("menor-preco init"));
    }
}
