use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use crate::config::Config;
use crate::embeddings::EmbeddingClient;
use crate::engine::{PassSummary, SyncEngine};
use crate::index::ArtworkIndex;
use crate::mirror::MirrorStore;
use crate::mirror::models::StatisticRow;
use crate::sources::{SUPPORTED_MUSEUMS, SourceRegistry};
use crate::{Result, SyncError};

async fn build_engine(config: &Config) -> Result<SyncEngine> {
    let embedder = Arc::new(EmbeddingClient::new(&config.embedding)?);
    let index = Arc::new(
        ArtworkIndex::open(
            &config.vector_database_path(),
            config.embedding.dimension as usize,
        )
        .await?,
    );
    let mirror = MirrorStore::connect(config.database_path()).await?;
    let sources = SourceRegistry::builtin(&config.sources);
    Ok(SyncEngine::new(sources, embedder, index, mirror))
}

fn spinner(message: String) -> ProgressBar {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Run a sync pass for the given museums, or all of them.
pub async fn sync(museums: Vec<String>) -> Result<()> {
    let config = Config::load_default()?;
    let engine = build_engine(&config).await?;

    let slugs = if museums.is_empty() {
        engine.sources().slugs()
    } else {
        museums
    };

    for slug in &slugs {
        if engine.sources().get(slug).is_none() {
            return Err(SyncError::Config(format!(
                "unknown museum '{}' (run `artsync museums` for the list)",
                slug
            )));
        }
    }

    // Fail fast on a dead embedding service instead of skipping every
    // record of every museum.
    engine.health_check()?;
    eprintln!("{}", style("✓ Embedding service is healthy").green());

    let mut failures = 0;
    for slug in &slugs {
        let bar = spinner(format!("Syncing {}", slug));
        match engine.sync_museum(slug).await {
            Ok(summary) => {
                bar.finish_and_clear();
                print_summary(&summary);
            }
            Err(e) => {
                bar.finish_and_clear();
                error!("Sync pass for '{}' failed: {}", slug, e);
                eprintln!("{} {}: {}", style("✗").red(), style(slug).bold(), e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(SyncError::Other(anyhow::anyhow!(
            "{} of {} museum passes failed",
            failures,
            slugs.len()
        )));
    }
    Ok(())
}

fn print_summary(summary: &PassSummary) {
    eprintln!(
        "{} {}: {} seen, {} indexed, {} skipped, {} failed, {} tombstoned ({:.1?})",
        style("✓").green(),
        style(&summary.museum).bold(),
        summary.seen,
        summary.indexed,
        summary.skipped,
        summary.failed,
        summary.tombstoned,
        summary.elapsed
    );

    if !summary.skip_reasons.is_empty() {
        let mut reasons: Vec<_> = summary.skip_reasons.iter().collect();
        reasons.sort_by_key(|(reason, _)| *reason);
        for (reason, count) in reasons {
            eprintln!("    {}: {}", reason, count);
        }
    }
}

/// Print the mirrored statistics, grouped per museum.
pub async fn show_stats() -> Result<()> {
    let config = Config::load_default()?;
    let mirror = MirrorStore::connect(config.database_path()).await?;
    let rows = mirror.statistics(None).await?;

    if rows.is_empty() {
        eprintln!("No statistics yet. Run `artsync sync` first.");
        return Ok(());
    }

    let mut current_museum: Option<&str> = None;
    for group in group_by_museum(&rows) {
        let museum = group[0].museum.as_str();
        if current_museum != Some(museum) {
            current_museum = Some(museum);
            eprintln!("{}", style(display_name(museum)).bold().cyan());
        }

        // Total row first, then facets by descending count.
        let mut facets: Vec<&StatisticRow> =
            group.iter().filter(|r| r.work_type.is_some()).collect();
        facets.sort_by(|a, b| b.count.cmp(&a.count));

        if let Some(total) = group.iter().find(|r| r.work_type.is_none()) {
            eprintln!("  {} {}", style("total").bold(), total.count);
        }
        for row in facets {
            if let Some(work_type) = &row.work_type {
                eprintln!("  {} {}", work_type, row.count);
            }
        }
    }

    Ok(())
}

fn group_by_museum(rows: &[StatisticRow]) -> Vec<&[StatisticRow]> {
    let mut groups = Vec::new();
    let mut start = 0;
    for (i, row) in rows.iter().enumerate() {
        if row.museum != rows[start].museum {
            groups.push(&rows[start..i]);
            start = i;
        }
    }
    if start < rows.len() {
        groups.push(&rows[start..]);
    }
    groups
}

fn display_name(slug: &str) -> &str {
    SUPPORTED_MUSEUMS
        .iter()
        .find(|info| info.slug == slug)
        .map(|info| info.full_name)
        .unwrap_or(slug)
}

/// List the museums with a built-in adapter.
pub fn list_museums() {
    for info in SUPPORTED_MUSEUMS {
        eprintln!(
            "{}  {} ({})",
            style(info.slug).bold().cyan(),
            info.full_name,
            info.short_name
        );
    }
}

/// Print the active configuration.
pub fn show_config() -> Result<()> {
    let config = Config::load_default()?;

    eprintln!("{}", style("Artsync Configuration").bold().cyan());
    eprintln!();
    eprintln!("{}", style("Embedding service:").bold().yellow());
    eprintln!(
        "  URL: {}",
        style(format!(
            "{}://{}:{}",
            config.embedding.protocol, config.embedding.host, config.embedding.port
        ))
        .cyan()
    );
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!("  Dimension: {}", style(config.embedding.dimension).cyan());
    eprintln!();
    eprintln!("{}", style("Source HTTP:").bold().yellow());
    eprintln!(
        "  User agent: {}",
        style(&config.sources.user_agent).cyan()
    );
    eprintln!(
        "  Timeout: {}s",
        style(config.sources.timeout_seconds).cyan()
    );
    eprintln!(
        "  Rate limit: {}ms",
        style(config.sources.rate_limit_ms).cyan()
    );
    eprintln!(
        "  Retries: {} (base delay {}ms)",
        style(config.sources.max_retries).cyan(),
        style(config.sources.retry_base_delay_ms).cyan()
    );
    eprintln!();
    eprintln!("  Mirror database: {}", config.database_path().display());
    eprintln!(
        "  Vector index: {}",
        config.vector_database_path().display()
    );

    Ok(())
}

/// Write the current configuration (defaults included) to disk so it can
/// be edited.
pub fn init_config() -> Result<()> {
    let config = Config::load_default()?;
    config.save()?;
    eprintln!(
        "{} Wrote configuration to {}",
        style("✓").green(),
        style(config.base_dir.join("config.toml").display()).cyan()
    );
    Ok(())
}
