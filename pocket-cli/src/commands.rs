//! Item commands.
//!
//! Every command receives a [`CommandContext`] holding the authenticated
//! client, so nothing runs before authorization has succeeded.

use anyhow::{Context, Result, bail};
use pocket_core::{AddOptions, CredentialSource, ItemClient, ItemTemplate, RetrieveOptions};
use std::io::Write;

/// State shared by all item commands.
pub struct CommandContext {
    pub client: ItemClient,
    /// Whether the credential was cached or just authorized.
    pub source: CredentialSource,
}

/// Report the authorized user.
pub fn login<W: Write>(ctx: &CommandContext, out: &mut W) -> Result<()> {
    writeln!(out, "Authorized as {}", ctx.client.username())?;
    Ok(())
}

/// Print items using `format`, or the default layout.
pub async fn list<W: Write>(
    ctx: &CommandContext,
    options: RetrieveOptions,
    format: Option<&str>,
    out: &mut W,
) -> Result<()> {
    let template = match format {
        Some(format) => ItemTemplate::parse(format).context("Invalid --format template")?,
        None => ItemTemplate::default(),
    };

    let items = ctx
        .client
        .retrieve(&options)
        .await
        .context("Failed to retrieve items")?;

    for item in &items {
        writeln!(out, "{}", template.render(item))?;
    }

    Ok(())
}

/// Save a URL.
pub async fn add(
    ctx: &CommandContext,
    url: String,
    title: Option<String>,
    tags: Option<String>,
) -> Result<()> {
    if url.trim().is_empty() {
        bail!("url not found");
    }

    let options = AddOptions { url, title, tags };
    ctx.client
        .add(&options)
        .await
        .context("Failed to add item")
}

/// Archive one item by id.
pub async fn archive<W: Write>(ctx: &CommandContext, item_id: &str, out: &mut W) -> Result<()> {
    let item_id: u64 = item_id
        .trim()
        .parse()
        .with_context(|| format!("item id should be a number, got '{}'", item_id))?;

    let applied = ctx
        .client
        .archive(item_id)
        .await
        .context("Failed to archive item")?;

    if applied {
        writeln!(out, "Archived {}", item_id)?;
    } else {
        bail!("Pocket did not archive item {}", item_id);
    }

    Ok(())
}
