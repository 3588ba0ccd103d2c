use std::path::PathBuf;

use {
    anyhow::Result,
    clap::Subcommand,
    nudge_banner::{Clock, FileStore, FlagStore, SystemClock},
    nudge_config::NudgeConfig,
};

use crate::banner_commands::store_path;

#[derive(Subcommand)]
pub enum FlagsAction {
    /// List every persisted flag with its age.
    List {
        /// Flag store file (overrides config value).
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Remove one flag, or all of them when no key is given.
    Clear {
        /// Storage key to remove.
        key: Option<String>,
        /// Flag store file (overrides config value).
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

pub fn handle_flags(config: &NudgeConfig, action: FlagsAction) -> Result<()> {
    match action {
        FlagsAction::List { store } => {
            let store = open(config, store);
            list(&store, &SystemClock);
            Ok(())
        },
        FlagsAction::Clear { key, store } => {
            let store = open(config, store);
            let removed = clear(&store, key.as_deref());
            eprintln!("Removed {removed} flag(s) from {}", store.path().display());
            Ok(())
        },
    }
}

fn open(config: &NudgeConfig, explicit: Option<PathBuf>) -> FileStore {
    FileStore::open(store_path(config, explicit.as_deref()))
}

fn list(store: &FileStore, clock: &dyn Clock) {
    let entries = store.entries();
    if entries.is_empty() {
        eprintln!("No flags in {}.", store.path().display());
        return;
    }
    let now = clock.now_seconds();
    for (key, value) in entries {
        match value.parse::<f64>() {
            Ok(at) => println!("  {key} = {value} ({})", describe_age(now - at)),
            Err(_) => println!("  {key} = {value} (not a timestamp)"),
        }
    }
}

fn clear(store: &dyn FlagStore, key: Option<&str>) -> usize {
    match key {
        Some(key) => {
            if store.get(key).is_none() {
                return 0;
            }
            store.remove(key);
            1
        },
        None => {
            let entries = store.entries();
            for (key, _) in &entries {
                store.remove(key);
            }
            entries.len()
        },
    }
}

fn describe_age(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    if seconds < 60.0 {
        format!("{seconds:.0}s ago")
    } else if seconds < 3_600.0 {
        format!("{:.0}m ago", seconds / 60.0)
    } else if seconds < 86_400.0 {
        format!("{:.1}h ago", seconds / 3_600.0)
    } else {
        format!("{:.1}d ago", seconds / 86_400.0)
    }
}
