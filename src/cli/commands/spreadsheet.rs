//! Spreadsheet commands: export, populate, list and forget.

use console::style;

use crate::cli::helpers::{confirm, open_database, print_spreadsheets, prompt_choice, spinner};
use crate::config::Settings;
use crate::models::Spreadsheet;
use crate::repository::{DbContext, Repository, SpreadsheetRepository};
use crate::sheets::{PopulateReport, SpreadsheetReconciler, SpreadsheetWriter};

use super::query::select_query;

/// Create a remote spreadsheet for a query, optionally populating it.
pub async fn cmd_spreadsheet_create(
    settings: &Settings,
    query_id: Option<i32>,
    populate: bool,
) -> anyhow::Result<()> {
    let ctx = open_database(settings)?;
    let Some(query) = select_query(&ctx.queries(), query_id).await? else {
        return Ok(());
    };

    let sheets = settings.sheets_client()?;
    let repo = ctx.spreadsheets();

    let pb = spinner(format!(
        "Creating spreadsheet for '{}'...",
        query.display_term()
    ))?;
    let created = SpreadsheetWriter::new(&sheets, &repo).create_for(query).await;
    pb.finish_and_clear();
    let spreadsheet = created?;

    println!(
        "{} Created spreadsheet {}: {}",
        style("✓").green(),
        spreadsheet.id.unwrap_or_default(),
        spreadsheet.url()
    );

    if populate {
        if let Some(id) = spreadsheet.id {
            populate_one(settings, &ctx, id).await?;
        }
    }

    Ok(())
}

/// Run a population pass on a spreadsheet.
pub async fn cmd_spreadsheet_populate(settings: &Settings, id: Option<i32>) -> anyhow::Result<()> {
    let ctx = open_database(settings)?;
    let Some(spreadsheet) = select_spreadsheet(&ctx.spreadsheets(), id).await? else {
        return Ok(());
    };
    let Some(id) = spreadsheet.id else {
        return Ok(());
    };

    populate_one(settings, &ctx, id).await
}

async fn populate_one(settings: &Settings, ctx: &DbContext, id: i32) -> anyhow::Result<()> {
    let sheets = settings.sheets_client()?;
    let prices = settings.price_client()?;
    let repo = ctx.spreadsheets();

    let pb = spinner(format!("Populating spreadsheet {}...", id))?;
    let result = SpreadsheetReconciler::new(&sheets, &prices, &repo)
        .with_concurrency(settings.fetch_concurrency)
        .reconcile(id)
        .await;
    pb.finish_and_clear();

    match result {
        Ok(report) => {
            print_report(id, &report);
            Ok(())
        }
        Err(e) => {
            println!("{} Spreadsheet {} was not populated", style("✗").red(), id);
            Err(e.into())
        }
    }
}

fn print_report(id: i32, report: &PopulateReport) {
    println!("{} Populated spreadsheet {}", style("✓").green(), id);
    if report.tabs_created > 0 {
        println!("  {:<16} {}", "Tabs created:", report.tabs_created);
    }
    println!("  {:<16} {}", "Tabs written:", report.sheets_written);
    if report.sheets_skipped > 0 {
        println!("  {:<16} {}", "Tabs skipped:", report.sheets_skipped);
    }
    println!("  {:<16} {}", "Rows appended:", report.rows_written);
}

/// Find a spreadsheet by id, or let the user pick one.
async fn select_spreadsheet(
    repo: &SpreadsheetRepository,
    id: Option<i32>,
) -> anyhow::Result<Option<Spreadsheet>> {
    if let Some(id) = id {
        return match repo.find_by_id(id).await {
            Ok(spreadsheet) => Ok(Some(spreadsheet)),
            Err(e) if e.is_not_found() => {
                println!("{} Spreadsheet {} not found", style("✗").red(), id);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        };
    }

    let spreadsheets = repo.find_all().await?;
    if spreadsheets.is_empty() {
        println!(
            "{} No spreadsheets yet. Run 'menor-preco spreadsheet create' first.",
            style("!").yellow()
        );
        return Ok(None);
    }

    print_spreadsheets(&spreadsheets);
    println!();
    Ok(prompt_choice("Spreadsheet", spreadsheets.len())?.map(|i| spreadsheets[i].clone()))
}

/// Delete the local record of a spreadsheet.
pub async fn cmd_spreadsheet_delete(
    settings: &Settings,
    id: Option<i32>,
    yes: bool,
) -> anyhow::Result<()> {
    let ctx = open_database(settings)?;
    let repo = ctx.spreadsheets();
    let Some(spreadsheet) = select_spreadsheet(&repo, id).await? else {
        return Ok(());
    };
    let Some(id) = spreadsheet.id else {
        return Ok(());
    };

    println!("\nForget spreadsheet {} ({})", id, spreadsheet.url());
    println!("  The remote spreadsheet is not deleted");

    if !yes && !confirm("\nProceed?")? {
        println!("{} Cancelled", style("!").yellow());
        return Ok(());
    }

    repo.delete_by_id(id).await?;
    println!("{} Deleted spreadsheet {}", style("✓").green(), id);

    Ok(())
}

/// List spreadsheets with their state and link.
pub async fn cmd_spreadsheet_list(settings: &Settings) -> anyhow::Result<()> {
    let ctx = open_database(settings)?;
    let spreadsheets = ctx.spreadsheets().find_all().await?;

    if spreadsheets.is_empty() {
        println!(
            "{} No spreadsheets yet. Run 'menor-preco spreadsheet create' first.",
            style("!").yellow()
        );
        return Ok(());
    }

    print_spreadsheets(&spreadsheets);
    Ok(())
}
