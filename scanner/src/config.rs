use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

pub const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
pub const SSDP_PORT: u16 = 1900;

pub const MIN_DELAY_RESPONSE: u32 = 1;
pub const MAX_DELAY_RESPONSE: u32 = 120;
/// Longest receive window and per-fetch timeout, in seconds
pub const MAX_TIMEOUT: u64 = 3600;

const DEFAULT_USER_AGENT: &str = "iOS/5.0 UDAP/2.0 iPhone/4";

/// Search target sent in the `ST` header of the M-SEARCH request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SearchType {
    #[default]
    #[serde(rename = "ssdp:all")]
    All,
    #[serde(rename = "upnp:rootdevice")]
    RootDevice,
}

impl SearchType {
    pub const ALL: [SearchType; 2] = [SearchType::All, SearchType::RootDevice];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::All => "ssdp:all",
            SearchType::RootDevice => "upnp:rootdevice",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SearchType::ALL
            .into_iter()
            .find(|search_type| search_type.as_str() == s)
            .ok_or_else(|| ConfigurationError::UnknownSearchType {
                search_type: s.to_string(),
                valid: SearchType::ALL
                    .iter()
                    .map(SearchType::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// What a repeated discovery call does with devices found by earlier calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    /// Every call starts from an empty registry
    #[default]
    Reset,
    /// New devices are appended to the previous registry; known locations are skipped
    Accumulate,
}

/// Scanner configuration.
///
/// Setters validate their input and leave the previous value untouched on
/// error, so a `Configuration` is always consistent: `1 <= delay_response <= 120`
/// and `delay_response <= timeout <= MAX_TIMEOUT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    host: IpAddr,
    port: u16,
    delay_response: u32,
    timeout: u64,
    user_agent: String,
    search_type: SearchType,
    mode: DiscoveryMode,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(SSDP_MULTICAST_ADDR),
            port: SSDP_PORT,
            delay_response: 1,
            timeout: 5,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            search_type: SearchType::default(),
            mode: DiscoveryMode::default(),
        }
    }
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `MX` value in seconds. Raises the timeout when it would
    /// otherwise fall below the new delay.
    pub fn set_delay_response(&mut self, delay: u32) -> Result<&mut Self, ConfigurationError> {
        if !(MIN_DELAY_RESPONSE..=MAX_DELAY_RESPONSE).contains(&delay) {
            return Err(ConfigurationError::DelayOutOfRange { delay });
        }

        self.delay_response = delay;
        if self.timeout < u64::from(delay) {
            debug!("Raising timeout from {}s to match delay of {}s", self.timeout, delay);
            self.timeout = u64::from(delay);
        }
        Ok(self)
    }

    /// Set the receive and fetch timeout in seconds
    pub fn set_timeout(&mut self, timeout: u64) -> Result<&mut Self, ConfigurationError> {
        if timeout < u64::from(self.delay_response) {
            return Err(ConfigurationError::TimeoutBelowDelay {
                timeout,
                delay: self.delay_response,
            });
        }
        if timeout > MAX_TIMEOUT {
            return Err(ConfigurationError::TimeoutTooLarge { timeout, max: MAX_TIMEOUT });
        }

        self.timeout = timeout;
        Ok(self)
    }

    pub fn set_search_type(&mut self, search_type: &str) -> Result<&mut Self, ConfigurationError> {
        self.search_type = search_type.parse()?;
        Ok(self)
    }

    pub fn set_search_target(&mut self, search_type: SearchType) -> &mut Self {
        self.search_type = search_type;
        self
    }

    pub fn set_user_agent(&mut self, user_agent: impl Into<String>) -> &mut Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn set_host(&mut self, host: IpAddr) -> &mut Self {
        self.host = host;
        self
    }

    pub fn set_port(&mut self, port: u16) -> &mut Self {
        self.port = port;
        self
    }

    pub fn set_mode(&mut self, mode: DiscoveryMode) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Re-check every constraint. Needed for values built through serde.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(MIN_DELAY_RESPONSE..=MAX_DELAY_RESPONSE).contains(&self.delay_response) {
            return Err(ConfigurationError::DelayOutOfRange {
                delay: self.delay_response,
            });
        }
        if self.timeout < u64::from(self.delay_response) {
            return Err(ConfigurationError::TimeoutBelowDelay {
                timeout: self.timeout,
                delay: self.delay_response,
            });
        }
        if self.timeout > MAX_TIMEOUT {
            return Err(ConfigurationError::TimeoutTooLarge {
                timeout: self.timeout,
                max: MAX_TIMEOUT,
            });
        }
        Ok(())
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn delay_response(&self) -> u32 {
        self.delay_response
    }

    /// Timeout in whole seconds, as configured
    pub fn timeout_secs(&self) -> u64 {
        self.timeout
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn search_type(&self) -> SearchType {
        self.search_type
    }

    pub fn mode(&self) -> DiscoveryMode {
        self.mode
    }
}
