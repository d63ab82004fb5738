use clap::{Arg, ArgAction, Command};
use sheet_i18n::{
    JsonFilePreferences, LanguageSession, MemoryTranslationStore, SyncConfig, SyncError,
    Synchronizer, TableFetcher, UpdateMode,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .init();

    let matches = Command::new("sheet-i18n")
        .version("0.1.0")
        .about("Download a spreadsheet translation table and look up terms")
        .arg(
            Arg::new("config")
                .help("Path to the JSON configuration file")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .index(1),
        )
        .arg(
            Arg::new("cached")
                .long("cached")
                .short('c')
                .help("Import the locally cached table instead of downloading")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("mode")
                .long("mode")
                .short('m')
                .help("Override the update mode")
                .value_parser(["replace", "add_only", "merge"]),
        )
        .arg(
            Arg::new("language")
                .long("language")
                .short('l')
                .help("Switch to this language after importing"),
        )
        .arg(
            Arg::new("cycle")
                .long("cycle")
                .help("Advance to the next known language")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("term")
                .long("term")
                .short('t')
                .help("Term key to translate (repeatable)")
                .action(ArgAction::Append),
        )
        .get_matches();

    let config_path = matches
        .get_one::<PathBuf>("config")
        .ok_or("Missing configuration path")?;
    let mut config = SyncConfig::from_file(config_path)?;
    if let Some(mode) = matches.get_one::<String>("mode") {
        config.update_mode = match mode.as_str() {
            "add_only" => UpdateMode::AddOnly,
            "merge" => UpdateMode::Merge,
            _ => UpdateMode::Replace,
        };
    }

    let store = Arc::new(MemoryTranslationStore::new());
    let fetcher = TableFetcher::http(config.fetch_timeout())?;
    let synchronizer = Synchronizer::from_config(store.clone(), &config);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    if matches.get_flag("cached") {
        synchronizer
            .sync_from_cache(&fetcher, &config.source)
            .await?;
    } else {
        match synchronizer.sync(&fetcher, &config.source, &cancel).await {
            Ok(outcome) => {
                if let Some(warning) = outcome.cache_warning {
                    warn!("{}", warning);
                }
            }
            Err(SyncError::Fetch(msg)) => {
                warn!("Download failed ({}), falling back to cached table", msg);
                synchronizer
                    .sync_from_cache(&fetcher, &config.source)
                    .await?;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let preferences = Arc::new(JsonFilePreferences::open(&config.preferences_path)?);
    let session = LanguageSession::from_config(store.clone(), preferences, &config);
    session.initialize_from_preferences()?;

    if let Some(language) = matches.get_one::<String>("language") {
        if !session.set_language(language) {
            return Err(format!("Language '{}' is not available", language).into());
        }
    }
    if matches.get_flag("cycle") {
        session.cycle_to_next_language()?;
    }

    info!(
        "Languages: {}",
        session.available_languages().join(", ")
    );
    let current = session.current_language().unwrap_or_default();
    println!("Current language: {}", current);

    if let Some(terms) = matches.get_many::<String>("term") {
        for term in terms {
            println!("{} = {}", term, session.translate(term));
        }
    }

    Ok(())
}
