use anyhow::{bail, Context, Result};
use std::env;
use std::time::Duration;
use time::macros::format_description;
use time::UtcOffset;

use crate::sink::{DEFAULT_WINDOW, STDOUT};

const OUTPUT_ENV: &str = "LOG_OUTPUT";
const ROTATE_ENV: &str = "LOG_ROTATE_SECS";
const OFFSET_ENV: &str = "LOG_UTC_OFFSET";
const ROUTES_ENV: &str = "LOG_ROUTES";

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Config {
    /// Descriptor for records without a dedicated route.
    pub output: String,
    pub window: Duration,
    pub offset: UtcOffset,
    /// Render record times in `offset` instead of UTC.
    pub use_local_time: bool,
    /// `(target, descriptor)` pairs.
    pub routes: Vec<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            output: STDOUT.to_owned(),
            window: DEFAULT_WINDOW,
            offset: UtcOffset::UTC,
            use_local_time: false,
            routes: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Config> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
        let mut config = Config::default();
        if let Some(output) = lookup(OUTPUT_ENV).filter(|v| !v.is_empty()) {
            config.output = output;
        }
        if let Some(secs) = lookup(ROTATE_ENV) {
            config.window =
                parse_window(&secs).with_context(|| format!("invalid {}", ROTATE_ENV))?;
        }
        if let Some(offset) = lookup(OFFSET_ENV) {
            config.offset =
                parse_offset(&offset).with_context(|| format!("invalid {}", OFFSET_ENV))?;
            config.use_local_time = true;
        }
        if let Some(routes) = lookup(ROUTES_ENV) {
            config.routes =
                parse_routes(&routes).with_context(|| format!("invalid {}", ROUTES_ENV))?;
        }
        Ok(config)
    }
}

fn parse_window(value: &str) -> Result<Duration> {
    let secs: u64 = value.trim().parse()?;
    if secs == 0 {
        bail!("rotation window must be positive");
    }
    Ok(Duration::from_secs(secs))
}

fn parse_offset(value: &str) -> Result<UtcOffset> {
    let format = format_description!("[offset_hour sign:mandatory]:[offset_minute]");
    Ok(UtcOffset::parse(value.trim(), format)?)
}

fn parse_routes(value: &str) -> Result<Vec<(String, String)>> {
    let mut routes = Vec::new();
    for pair in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((target, descriptor)) = pair.split_once('=') else {
            bail!("expected target=destination, got {:?}", pair);
        };
        let (target, descriptor) = (target.trim(), descriptor.trim());
        if target.is_empty() || descriptor.is_empty() {
            bail!("empty target or destination in {:?}", pair);
        }
        routes.push((target.to_owned(), descriptor.to_owned()));
    }
    Ok(routes)
}
