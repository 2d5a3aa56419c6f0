//! Pairs command implementation.
//!
//! Lists the catalogued pairs with optional filtering.

use anyhow::Result;
use trawl_lib::prelude::*;

/// List catalogued pairs with an optional exchange filter or search pattern.
pub(crate) fn list_pairs(
    config: &TrawlConfig,
    exchange: Option<Exchange>,
    search: Option<&str>,
) -> Result<()> {
    let catalog = config.catalog()?;

    let pairs: Vec<_> = match search {
        Some(pattern) => catalog.search(pattern),
        None => catalog.units().collect(),
    };
    let pairs: Vec<_> = pairs
        .into_iter()
        .filter(|(ex, _)| exchange.is_none_or(|e| e == *ex))
        .collect();

    if pairs.is_empty() {
        println!("No pairs found.");
        return Ok(());
    }

    println!("{:<10} {:<12} {}", "EXCHANGE", "PAIR", "STORED");
    println!("{}", "-".repeat(40));

    for (ex, pair) in &pairs {
        let stored = CsvTickStore::new(config.store_dir(*ex), Vec::new())
            .path_for(pair)
            .exists();
        println!(
            "{:<10} {:<12} {}",
            ex.as_str(),
            pair,
            if stored { "yes" } else { "no" }
        );
    }

    println!("\nTotal: {} pairs", pairs.len());
    Ok(())
}
