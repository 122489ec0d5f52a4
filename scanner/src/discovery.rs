use std::sync::{Mutex, MutexGuard, PoisonError};

use log::info;

use crate::config::{Configuration, DiscoveryMode};
use crate::error::{ConfigurationError, Result};
use crate::registry::DeviceRegistry;
use crate::transport::device::normalize_counted;
use crate::transport::fetch::DescriptionFetcher;
use crate::transport::response::{collect_locations, parse_response, ParsedHeader};
use crate::transport::ssdp::{build_msearch_request, MulticastTransport};

/// Per-item outcome counts of one discovery run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryStats {
    /// Datagrams received before the timeout
    pub responses: usize,
    /// Unique description locations fetched
    pub locations: usize,
    /// Locations whose fetch failed or returned nothing
    pub fetch_failures: usize,
    /// Fetched bodies dropped because they did not parse
    pub parse_failures: usize,
    /// Devices produced by this run
    pub devices: usize,
}

#[derive(Debug, Default)]
struct ScanState {
    registry: Option<DeviceRegistry>,
    stats: Option<DiscoveryStats>,
}

/// UPnP device scanner.
///
/// Each [`discover`](Scanner::discover) call sends one M-SEARCH, fetches
/// every advertised description once and normalizes the results. Calls on
/// the same scanner are serialized.
#[derive(Debug)]
pub struct Scanner {
    config: Configuration,
    state: Mutex<ScanState>,
}

impl Scanner {
    pub fn new(config: Configuration) -> std::result::Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            config,
            state: Mutex::new(ScanState::default()),
        })
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Run discovery now. Fails only when the UDP request cannot be sent
    /// or the fetch runtime cannot start.
    pub fn discover(&self) -> Result<DeviceRegistry> {
        let mut state = self.lock_state();

        let (found, stats) = run_discovery(&self.config)?;

        let registry = match (self.config.mode(), state.registry.take()) {
            (DiscoveryMode::Accumulate, Some(mut previous)) => {
                previous.merge(found);
                previous
            }
            _ => found,
        };

        state.registry = Some(registry.clone());
        state.stats = Some(stats);
        Ok(registry)
    }

    /// Result of the last successful discovery, without any network I/O
    pub fn cached(&self) -> Option<DeviceRegistry> {
        self.lock_state().registry.clone()
    }

    /// Cached result, discovering first if there is none or `force_refresh` is set
    pub fn registry(&self, force_refresh: bool) -> Result<DeviceRegistry> {
        if !force_refresh {
            if let Some(registry) = self.cached() {
                return Ok(registry);
            }
        }
        self.discover()
    }

    pub fn last_stats(&self) -> Option<DiscoveryStats> {
        self.lock_state().stats
    }

    fn lock_state(&self) -> MutexGuard<'_, ScanState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn run_discovery(config: &Configuration) -> Result<(DeviceRegistry, DiscoveryStats)> {
    info!(
        "Starting discovery (ST={}, MX={}, timeout={}s)",
        config.search_type(),
        config.delay_response(),
        config.timeout_secs()
    );

    let request = build_msearch_request(config);
    let responses = MulticastTransport::new(config).collect(&request)?;

    let headers: Vec<ParsedHeader> = responses.iter().map(|raw| parse_response(raw)).collect();
    let locations = collect_locations(&headers);
    info!(
        "{} responses advertised {} unique locations",
        responses.len(),
        locations.len()
    );

    let bodies = DescriptionFetcher::new(config.timeout()).fetch(&locations)?;
    let fetch_failures = bodies.values().filter(|body| body.is_empty()).count();

    let (registry, parse_failures) = normalize_counted(&bodies);

    let stats = DiscoveryStats {
        responses: responses.len(),
        locations: locations.len(),
        fetch_failures,
        parse_failures,
        devices: registry.total(),
    };
    info!("Discovery finished: {:?}", stats);

    Ok((registry, stats))
}

/// Convenience function for a one-off discovery with the default configuration
pub fn discover_devices() -> Result<DeviceRegistry> {
    Scanner::new(Configuration::default())?.discover()
}

/// Convenience function for a one-off discovery with a custom timeout in seconds
pub fn discover_devices_with_timeout(timeout: u64) -> Result<DeviceRegistry> {
    let mut config = Configuration::default();
    config.set_timeout(timeout)?;
    Scanner::new(config)?.discover()
}
