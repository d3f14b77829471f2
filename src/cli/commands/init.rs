//! Initialize command.

use console::style;

use crate::config::Settings;

/// Initialize the data directory and database.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let ctx = settings.create_db_context();
    ctx.init_schema().await?;

    println!(
        "{} Initialized database at {}",
        style("✓").green(),
        settings.database_url()
    );

    let token = settings.token_path();
    if settings.access_token.is_none() && !token.exists() {
        println!(
            "{} No Google token found at {}",
            style("!").yellow(),
            token.display()
        );
        println!("  Set TOKEN to an authorized-user token file before exporting spreadsheets");
    }

    Ok(())
}
