use crate::{
    api::ApiSettings,
    cli::actions::Action,
    collectors::{COLLECTOR_NAMES, Collector, all_factories, config::TierIntervals},
    exporter::{ExporterSettings, WebhookSettings},
};
use anyhow::{Result, anyhow};
use clap::ArgMatches;
use secrecy::SecretString;
use std::time::Duration;

pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>("port")
        .copied()
        .ok_or_else(|| anyhow!("Port is required. Please provide it using the --port flag."))?;

    // Get the listen address (None means auto-detect)
    let listen = matches.get_one::<String>("listen").map(|s| s.to_string());

    let api_key = SecretString::from(
        matches
            .get_one::<String>("api-key")
            .map(|s: &String| s.to_string())
            .ok_or_else(|| {
                anyhow!("API key is required. Please provide it using the --api-key flag.")
            })?,
    );

    let api = ApiSettings {
        base_url: matches
            .get_one::<String>("api-url")
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("API URL is required"))?,
        key: api_key,
        timeout: Duration::from_secs(seconds(matches, "api-timeout")),
        max_concurrent_requests: match matches
            .get_one::<usize>("max-concurrent-requests")
            .copied()
            .unwrap_or(5)
        {
            0 => None,
            n => Some(n),
        },
    };

    // Ordering violations abort here, before anything is spawned.
    let intervals = TierIntervals::new(
        seconds(matches, "interval-fast"),
        seconds(matches, "interval-medium"),
        seconds(matches, "interval-slow"),
    )?;

    let webhook = WebhookSettings {
        enabled: matches.get_flag("webhook-enabled"),
        require_secret: matches
            .get_one::<bool>("webhook-require-secret")
            .copied()
            .unwrap_or(true),
        secret: matches
            .get_one::<String>("webhook-secret")
            .map(|s| SecretString::from(s.to_string())),
        max_body_bytes: matches
            .get_one::<usize>("webhook-max-body-bytes")
            .copied()
            .unwrap_or(64 * 1024),
    };

    let organizations: Vec<String> = matches
        .get_many::<String>("organizations")
        .map(|vals| {
            vals.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok(Action::Run {
        settings: ExporterSettings {
            port,
            listen,
            api,
            organizations,
            collectors: get_enabled_collectors(matches),
            intervals,
            collector_timeout: Duration::from_secs(seconds(matches, "collector-timeout")),
            client_ttl: Duration::from_secs(seconds(matches, "client-ttl")),
            discovery_ttl: Duration::from_secs(seconds(matches, "discovery-ttl")),
            webhook,
        },
    })
}

fn seconds(matches: &ArgMatches, name: &str) -> u64 {
    matches.get_one::<u64>(name).copied().unwrap_or_default()
}

pub fn get_enabled_collectors(matches: &ArgMatches) -> Vec<String> {
    let factories = all_factories();

    COLLECTOR_NAMES
        .iter()
        .filter(|&name| {
            let enable_flag = format!("collector.{}", name);
            let disable_flag = format!("no-collector.{}", name);

            // If explicitly disabled, skip it
            if matches.get_flag(&disable_flag) {
                return false;
            }

            // If explicitly enabled, include it
            if matches.get_flag(&enable_flag) {
                return true;
            }

            // Otherwise, check the collector's default setting
            if let Some(factory) = factories.get(name) {
                let collector = factory();
                collector.enabled_by_default()
            } else {
                false // Fallback if collector not found
            }
        })
        .map(|&name| name.to_string())
        .collect()
}
