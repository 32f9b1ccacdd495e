use std::process::ExitCode;

use hyperjump::{ConfigSnapshot, SettingsStore};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Optional JSON settings file as the only argument
    let snapshot = match std::env::args().nth(1) {
        Some(path) => match ConfigSnapshot::load_json_file(&path) {
            Ok(snapshot) => {
                log::info!("Loaded settings from {}", path);
                snapshot
            }
            Err(e) => {
                log::warn!("Ignoring settings file {}: {}", path, e);
                ConfigSnapshot::default()
            }
        },
        None => ConfigSnapshot::default(),
    };

    let settings = SettingsStore::new(snapshot);
    match hyperjump::window::run(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
