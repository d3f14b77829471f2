//! Query management commands.

use console::style;

use crate::cli::helpers::{confirm, open_database, print_queries, prompt_choice, spinner, truncate};
use crate::config::Settings;
use crate::models::{encode_term, Category, Query};
use crate::repository::{QueryRepository, Repository};
use crate::scrapers::{CategoryDiscovery, DiscoveryError, LocalityResolver};

/// Create a query: resolve localities, discover categories, pick one, save.
pub async fn cmd_query_create(
    settings: &Settings,
    term: &str,
    names: &[String],
    radius: f64,
    category: Option<usize>,
) -> anyhow::Result<()> {
    if term.trim().is_empty() {
        anyhow::bail!("search term cannot be empty");
    }

    let ctx = open_database(settings)?;
    let api = settings.price_client()?;
    let locality_repo = ctx.localities();
    let category_repo = ctx.categories();

    let pb = spinner("Resolving localities...")?;
    let localities = LocalityResolver::new(&api, &locality_repo)
        .resolve(names)
        .await;
    pb.finish_and_clear();

    if localities.len() < names.len() {
        println!(
            "{} Found {} of {} localities",
            style("!").yellow(),
            localities.len(),
            names.len()
        );
    }
    if localities.is_empty() {
        println!("{} None of the localities could be found", style("✗").red());
        return Ok(());
    }

    let mut query = Query::new(term, localities, radius);

    let pb = spinner("Searching categories...")?;
    let discovered = CategoryDiscovery::new(&api, &category_repo)
        .discover(&query, |locality, index, total| {
            pb.set_message(format!(
                "Searching categories in {} ({}/{})",
                locality.name,
                index + 1,
                total
            ));
        })
        .await;
    pb.finish_and_clear();

    let categories = match discovered {
        Ok(categories) => categories,
        Err(DiscoveryError::NoCategoriesFound(_)) => {
            println!(
                "{} No categories found for '{}' in {}",
                style("✗").red(),
                query.display_term(),
                query.locality_names()
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let Some(chosen) = choose_category(&categories, category)? else {
        println!("{} Cancelled", style("!").yellow());
        return Ok(());
    };
    query.category = Some(chosen);

    let saved = ctx.queries().save(query).await?;
    println!(
        "{} Saved query {}",
        style("✓").green(),
        saved.id.unwrap_or_default()
    );
    print_queries(std::slice::from_ref(&saved));

    Ok(())
}

/// Pick a category by 1-based index, prompting when no index is given.
fn choose_category(
    categories: &[Category],
    index: Option<usize>,
) -> anyhow::Result<Option<Category>> {
    if let Some(n) = index {
        return match n.checked_sub(1).and_then(|i| categories.get(i)) {
            Some(category) => Ok(Some(category.clone())),
            None => anyhow::bail!(
                "category index {} out of range (found {})",
                n,
                categories.len()
            ),
        };
    }

    println!("\n{}", style("Categories").bold());
    for (i, category) in categories.iter().enumerate() {
        println!("  {:>3}. {}", i + 1, truncate(&category.description, 60));
    }
    println!();

    Ok(prompt_choice("Category", categories.len())?.map(|i| categories[i].clone()))
}

/// Find a query by id, or let the user pick one from the saved queries.
pub(super) async fn select_query(
    repo: &QueryRepository,
    id: Option<i32>,
) -> anyhow::Result<Option<Query>> {
    if let Some(id) = id {
        return match repo.find_by_id(id).await {
            Ok(query) => Ok(Some(query)),
            Err(e) if e.is_not_found() => {
                println!("{} Query {} not found", style("✗").red(), id);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        };
    }

    let queries = repo.find_all().await?;
    if queries.is_empty() {
        println!(
            "{} No queries saved. Run 'menor-preco query create' first.",
            style("!").yellow()
        );
        return Ok(None);
    }

    print_queries(&queries);
    println!();
    Ok(prompt_choice("Query", queries.len())?.map(|i| queries[i].clone()))
}

/// Change the term, category or radius of a saved query.
pub async fn cmd_query_update(
    settings: &Settings,
    id: Option<i32>,
    term: Option<&str>,
    category_id: Option<i32>,
    radius: Option<f64>,
) -> anyhow::Result<()> {
    if term.is_none() && category_id.is_none() && radius.is_none() {
        println!(
            "{} Nothing to update. Pass --term, --category or --radius.",
            style("!").yellow()
        );
        return Ok(());
    }

    let ctx = open_database(settings)?;
    let repo = ctx.queries();
    let Some(mut query) = select_query(&repo, id).await? else {
        return Ok(());
    };

    if let Some(term) = term {
        if term.trim().is_empty() {
            anyhow::bail!("search term cannot be empty");
        }
        query.term = encode_term(term);
    }
    if let Some(category_id) = category_id {
        let category = match ctx.categories().find_by_id(category_id).await {
            Ok(category) => category,
            Err(e) if e.is_not_found() => {
                println!("{} Category {} not found", style("✗").red(), category_id);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        query.category = Some(category);
    }
    if let Some(radius) = radius {
        query.radius = radius;
    }

    let saved = repo.save(query).await?;
    println!(
        "{} Updated query {}",
        style("✓").green(),
        saved.id.unwrap_or_default()
    );
    print_queries(std::slice::from_ref(&saved));

    Ok(())
}

/// Delete a query. Spreadsheets exported from it are detached, not deleted.
pub async fn cmd_query_delete(
    settings: &Settings,
    id: Option<i32>,
    yes: bool,
) -> anyhow::Result<()> {
    let ctx = open_database(settings)?;
    let repo = ctx.queries();
    let Some(query) = select_query(&repo, id).await? else {
        return Ok(());
    };
    let Some(query_id) = query.id else {
        return Ok(());
    };

    let attached = ctx.spreadsheets().find_by_query_id(query_id).await?;

    println!("\nDelete query {} ('{}')", query_id, query.display_term());
    if !attached.is_empty() {
        println!(
            "  {} spreadsheet(s) will be kept but no longer populated",
            attached.len()
        );
    }

    if !yes && !confirm("\nProceed?")? {
        println!("{} Cancelled", style("!").yellow());
        return Ok(());
    }

    repo.delete_by_id(query_id).await?;
    println!("{} Deleted query {}", style("✓").green(), query_id);

    Ok(())
}

/// List saved queries.
pub async fn cmd_query_list(settings: &Settings) -> anyhow::Result<()> {
    let ctx = open_database(settings)?;
    let queries = ctx.queries().find_all().await?;

    if queries.is_empty() {
        println!(
            "{} No queries saved. Run 'menor-preco query create' first.",
            style("!").yellow()
        );
        return Ok(());
    }

    print_queries(&queries);
    Ok(())
}
