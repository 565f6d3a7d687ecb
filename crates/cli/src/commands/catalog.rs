//! Listing and toggling products and categories.

use display_toggle_console::{ConsoleConfig, DirtyTracker, Entity};
use display_toggle_core::{Category, CategoryId, DisplayFlag, Product, ProductId};

use super::{CommandError, open_session, report_outcome};

const fn marker(flag: DisplayFlag) -> &'static str {
    if flag.is_shown() { "[x]" } else { "[ ]" }
}

/// List categories in register order.
pub async fn list_categories(config: &ConsoleConfig) -> Result<(), CommandError> {
    let mut session = open_session(config).await?;
    session.load_catalog().await?;

    for category in session.categories().entities() {
        tracing::info!("{}", category_line(category));
    }
    tracing::info!("{} categories", session.categories().len());
    Ok(())
}

/// List products, filtered the way the product screen filters them.
pub async fn list_products(
    config: &ConsoleConfig,
    category: Option<String>,
    all: bool,
    search: Option<String>,
) -> Result<(), CommandError> {
    let mut session = open_session(config).await?;
    session.load_catalog().await?;

    if all {
        session.select_category(None)?;
    } else if let Some(id) = category {
        session.select_category(Some(CategoryId::new(id)))?;
    }
    if let Some(text) = search {
        session.set_search(text);
    }

    let visible = session.visible_products();
    for product in &visible {
        let image = session
            .image_url(&product.product_id)
            .map(|url| format!("  {url}"))
            .unwrap_or_default();
        tracing::info!("{}{image}", product_line(product));
    }

    let scope = session
        .selected_category()
        .and_then(|id| session.categories().get(id))
        .and_then(|c| c.category_name.clone())
        .unwrap_or_else(|| "all categories".to_string());
    tracing::info!(
        "{} of {} products ({scope})",
        visible.len(),
        session.products().len()
    );
    Ok(())
}

/// Show or hide products and apply the change.
pub async fn set_products(
    config: &ConsoleConfig,
    shown: bool,
    ids: &[String],
) -> Result<(), CommandError> {
    let mut session = open_session(config).await?;
    session.load_catalog().await?;

    for id in ids {
        session.toggle_product(&ProductId::new(id.as_str()), shown)?;
    }
    log_pending(session.products(), product_line);

    let report = session.apply_products().await;
    report_outcome("product", &report)
}

/// Show or hide categories and apply the change.
pub async fn set_categories(
    config: &ConsoleConfig,
    shown: bool,
    ids: &[String],
) -> Result<(), CommandError> {
    let mut session = open_session(config).await?;
    session.load_catalog().await?;

    for id in ids {
        session.toggle_category(&CategoryId::new(id.as_str()), shown)?;
    }
    log_pending(session.categories(), category_line);

    let report = session.apply_categories().await;
    report_outcome("category", &report)
}

fn log_pending<E: Entity>(tracker: &DirtyTracker<E>, line: impl Fn(&E) -> String) {
    for entity in tracker.entities() {
        if tracker.is_dirty(entity.id()) == Some(true) {
            tracing::info!("-> {}", line(entity));
        }
    }
}

fn product_line(product: &Product) -> String {
    format!(
        "{} {:>10}  {:<16} {}",
        marker(product.display_flag),
        product.product_id.as_str(),
        product.product_code.as_deref().unwrap_or("-"),
        product.product_name.as_deref().unwrap_or("(unnamed)"),
    )
}

fn category_line(category: &Category) -> String {
    format!(
        "{} {:>6}  {}",
        marker(category.display_flag),
        category.category_id.as_str(),
        category.category_name.as_deref().unwrap_or("(unnamed)"),
    )
}
