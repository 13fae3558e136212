mod api;
mod cli;
mod config;
mod db;
mod tracker;

use crate::cli::{Cli, Commands, ConfigCommands};
use crate::config::Config;
use crate::db::{Database, SettingsUpdate};
use crate::tracker::VisitRequest;
use crate::tracker::domain::normalize_to_hostname;
use crate::tracker::minutes::current_minute_of_day;
use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Service => {
            let config = load_or_default_config()?;
            run_service(config).await
        }
        Commands::Config { command } => handle_config_command(command),
        Commands::Status => handle_status(),
        Commands::Doctor => handle_doctor(),
        Commands::Top { limit } => handle_top(limit),
        Commands::Track { url, title } => handle_track(url, title),
        Commands::Forget { domain } => handle_forget(&domain),
        Commands::Ignore { domain } => handle_ignore(&domain, true),
        Commands::Unignore { domain } => handle_ignore(&domain, false),
        Commands::MergeToRoot { enabled } => handle_merge_to_root(enabled),
        Commands::Stats => handle_stats(),
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            println!("Config saved: {key} = {value}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_or_default_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_status() -> Result<()> {
    let config = load_or_default_config()?;
    let database = Database::open(&config.db_path)?;
    let settings = database.settings()?;

    println!("OpenMarks status");
    println!("- db_path: {}", config.db_path.display());
    println!("- api: http://{}:{}", config.api_host, config.api_port);
    println!("- domains: {}", database.domain_count()?);
    println!(
        "- last_visit_at: {}",
        database
            .latest_visit_timestamp()?
            .and_then(|timestamp| Local.timestamp_millis_opt(timestamp).single())
            .map(|datetime| datetime.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    println!("- merge_to_root: {}", settings.merge_to_root);
    println!("- ignored_domains: {}", settings.ignored_domains.join(", "));

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing".to_string());
    }

    let config = load_or_default_config()?;

    match Database::open(&config.db_path).and_then(|database| database.settings()) {
        Ok(_) => println!("[OK] SQLite reachable: {}", config.db_path.display()),
        Err(error) => {
            println!("[WARN] SQLite check failed: {error}");
            issues.push("db unreachable".to_string());
        }
    }

    if config.default_limit <= config.max_limit {
        println!(
            "[OK] bookmark limits valid: default {} / max {}",
            config.default_limit, config.max_limit
        );
    } else {
        println!(
            "[WARN] default_limit ({}) exceeds max_limit ({})",
            config.default_limit, config.max_limit
        );
        issues.push("invalid limits".to_string());
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

fn handle_top(limit: Option<usize>) -> Result<()> {
    let config = load_or_default_config()?;
    let database = Database::open(&config.db_path)?;
    let limit = config.effective_limit(limit);
    let now = Local::now();

    let entries = tracker::list_bookmarks(&database, limit, current_minute_of_day(&now))?;

    if entries.is_empty() {
        println!("No bookmarks yet. Send visits to POST /api/track.");
        return Ok(());
    }

    println!("Top bookmarks at {}", now.format("%H:%M"));
    entries.iter().enumerate().for_each(|(index, entry)| {
        println!(
            "{:>3}. {:<40} {:>8.2}  {} ({} visits)",
            index + 1,
            entry.title,
            entry.score,
            entry.url,
            entry.visits
        );
    });

    Ok(())
}

fn handle_track(url: String, title: Option<String>) -> Result<()> {
    let config = load_or_default_config()?;
    let mut database = Database::open(&config.db_path)?;
    let settings = database.settings()?;

    let outcome = tracker::record_visit(
        &mut database,
        &settings,
        VisitRequest {
            url: Some(url.clone()),
            title,
            timestamp: None,
        },
        &Local,
    )?;

    if outcome.ignored {
        println!("Ignored: {url}");
    } else {
        println!("Recorded: {url}");
    }

    Ok(())
}

fn handle_forget(domain: &str) -> Result<()> {
    let config = load_or_default_config()?;
    let mut database = Database::open(&config.db_path)?;

    if database.domain_stat(domain)?.is_none() {
        println!("Not tracked: {domain}");
        return Ok(());
    }

    let visits = database.visit_log_count(domain)?;
    tracker::delete_bookmark(&mut database, domain)?;

    println!("Removed: {domain} ({visits} logged visits)");
    Ok(())
}

fn handle_ignore(domain: &str, ignore: bool) -> Result<()> {
    let config = load_or_default_config()?;
    let mut database = Database::open(&config.db_path)?;
    let target = normalize_to_hostname(domain);

    let mut ignored_domains = database
        .settings()?
        .ignored_domains
        .into_iter()
        .filter(|existing| normalize_to_hostname(existing) != target)
        .collect::<Vec<_>>();
    if ignore {
        ignored_domains.push(target);
    }

    let settings = database.save_settings(&SettingsUpdate {
        merge_to_root: None,
        ignored_domains: Some(ignored_domains),
    })?;

    println!("Ignored domains: {}", settings.ignored_domains.join(", "));
    Ok(())
}

fn handle_merge_to_root(enabled: bool) -> Result<()> {
    let config = load_or_default_config()?;
    let mut database = Database::open(&config.db_path)?;
    let settings = database.save_settings(&SettingsUpdate {
        merge_to_root: Some(enabled),
        ignored_domains: None,
    })?;

    println!("merge_to_root = {}", settings.merge_to_root);
    Ok(())
}

fn handle_stats() -> Result<()> {
    const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

    let config = load_or_default_config()?;
    let database = Database::open(&config.db_path)?;

    println!("Top sites");
    for site in database.top_sites(20)? {
        println!("- {:<40} {:>6} visits", site.domain, site.visit_count);
    }

    println!("Visits by day of week");
    for row in database.visits_by_weekday()? {
        let label = WEEKDAYS.get(row.day as usize).copied().unwrap_or("?");
        println!("- {label}: {}", row.count);
    }

    println!("Visits by hour");
    for row in database.visits_by_hour()? {
        println!("- {:02}:00 {}", row.hour, row.count);
    }

    Ok(())
}

async fn run_service(config: Config) -> Result<()> {
    config.ensure_bootstrap_files()?;
    let _ = Database::open(&config.db_path)?;

    let api_config = Arc::new(config);

    info!(db_path = %api_config.db_path.display(), "OpenMarks service started");

    tokio::select! {
        api_result = api::run_server(api_config) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn load_or_default_config() -> Result<Config> {
    Config::load()
        .or_else(|_| {
            let config = Config::default();
            config.ensure_bootstrap_files()?;
            config.save()?;
            Ok::<_, anyhow::Error>(config)
        })
        .and_then(Config::apply_env_overrides)
}
