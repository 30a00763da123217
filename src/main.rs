use anyhow::{Context, Result};
use clap::Parser;
use std::net::IpAddr;
use std::path::Path;
use tokio_util::sync::CancellationToken;

mod cli;
mod config;
mod export;
mod extract;
mod ingest;
mod lookup;
mod state;

use cli::Args;
use config::Config;
use export::{export_csv, print_summary, render_map, timestamped_path};
use extract::families::SystemResolver;
use extract::{extract_route, Extraction};
use lookup::{GeoCache, GeoResolver};
use state::RouteSummary;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let config = Config::from(&args);
    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("creating output directory {}", config.output_dir.display()))?;

    // Stage 1: ingest
    let text = match &args.input {
        Some(path) => ingest::collect_from_file(Path::new(path))?,
        None => {
            println!("Paste your traceroute/MTR output, then press Ctrl+D (or Ctrl+C) when done:");
            let cancel = CancellationToken::new();
            let watcher = spawn_ctrl_c_watcher(cancel.clone());
            let text = ingest::collect_from_stdin(&cancel).await;
            watcher.abort();
            text
        }
    };

    if ingest::is_empty_trace(&text) {
        println!("No input provided; nothing to do.");
        return Ok(());
    }

    // Stage 2: extract
    let Extraction { mut summary, family } = match extract_route(&text, &SystemResolver) {
        Ok(extraction) => extraction,
        Err(e) => {
            println!("{}; nothing to do.", e);
            return Ok(());
        }
    };
    eprintln!(
        "Extracted {} hops ({} unreachable) via {:?}",
        summary.hops.len(),
        summary.unreachable.len(),
        family
    );

    // Stage 3: resolve
    if config.geo_enabled {
        resolve_geolocation(&mut summary, &config).await;
    }

    // Stage 4: render. Artifacts are independent; one failing must not
    // stop the others.
    if config.map_enabled {
        match render_map(&summary, &config, &config.output_dir) {
            Ok(path) => println!("Map saved to {}", path.display()),
            Err(e) => eprintln!("Warning: map rendering failed: {}", e),
        }
    }

    if let Err(e) = print_summary(&summary, &config, std::io::stdout()) {
        eprintln!("Warning: console summary failed: {}", e);
    }

    if config.csv_enabled {
        match write_csv(&summary, &config) {
            Ok(path) => println!("Data saved to {}", path.display()),
            Err(e) => eprintln!("Warning: CSV export failed: {}", e),
        }
    }

    Ok(())
}

fn spawn_ctrl_c_watcher(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        cancel.cancel();
    })
}

/// Fan out geolocation lookups over the distinct extracted addresses and
/// attach whatever resolved. Ctrl+C cancels outstanding batches; completed
/// facts are kept and rendering proceeds.
async fn resolve_geolocation(summary: &mut RouteSummary, config: &Config) {
    let resolver = match GeoResolver::new(config.http_timeout) {
        Ok(resolver) => resolver,
        Err(e) => {
            eprintln!("Warning: geolocation disabled (HTTP client failed): {}", e);
            return;
        }
    };
    let cache = GeoCache::new();
    let addresses: Vec<IpAddr> = summary.hops.iter().map(|h| h.address).collect();

    let cancel = CancellationToken::new();
    let watcher = spawn_ctrl_c_watcher(cancel.clone());
    resolver
        .resolve_all(&addresses, &cache, config.max_concurrent_lookups, &cancel)
        .await;
    watcher.abort();

    for address in addresses {
        if let Some(Some(fact)) = cache.get(&address) {
            summary.attach_geo(fact);
        }
    }
}

fn write_csv(summary: &RouteSummary, config: &Config) -> Result<std::path::PathBuf> {
    let path = timestamped_path(&config.output_dir, "trace_data", "csv", summary.captured_at);
    let file = std::fs::File::create(&path)
        .with_context(|| format!("creating {}", path.display()))?;
    export_csv(summary, std::io::BufWriter::new(file))?;
    Ok(path)
}
