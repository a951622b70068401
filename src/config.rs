use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::DefinitionError;

/// Parser behaviour. Every field has a default so a configuration file only
/// needs to mention what it changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// The character introducing a named argument (`-p`, `--player`).
    pub flag_prefix: char,
    /// Separates a named argument from its value within one token (`-p=pim`).
    pub separator: char,
    /// Takes the value of a named argument from the following token instead
    /// (`-p pim`).
    pub space_separated: bool,
    /// Rejects a non-repeatable named argument given twice instead of letting
    /// the later value win.
    pub reject_duplicates: bool,
    /// Captures a backtrace in every `CommandError`.
    pub capture_backtraces: bool,
    pub cache: CacheConfig,
}

impl Default for ParserConfig {
    fn default() -> ParserConfig {
        ParserConfig {
            flag_prefix: '-',
            separator: '=',
            space_separated: false,
            reject_duplicates: true,
            capture_backtraces: false,
            cache: CacheConfig::default(),
        }
    }
}

impl ParserConfig {
    pub fn from_toml_str(text: &str) -> Result<ParserConfig, failure::Error> {
        let config: ParserConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<ParserConfig, failure::Error> {
        let text = std::fs::read_to_string(path)?;
        trace!("loading parser config from {}", path.display());
        ParserConfig::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), DefinitionError> {
        let invalid = |reason: &str| {
            Err(DefinitionError::InvalidConfig {
                reason: reason.to_owned(),
            })
        };

        if self.flag_prefix.is_whitespace() || self.flag_prefix == '"' {
            return invalid("the flag prefix must not be whitespace or a quote");
        }

        if !self.space_separated {
            if self.separator.is_whitespace() || self.separator == '"' {
                return invalid("the separator must not be whitespace or a quote");
            }

            if self.separator == self.flag_prefix {
                return invalid("the separator must differ from the flag prefix");
            }
        }

        Ok(())
    }

    /// Whether a named argument called `name` can be written on the command
    /// line: it must not start with the flag prefix and, unless values come
    /// from the following token, must not contain the separator.
    pub fn is_addressable(&self, name: &str) -> bool {
        !name.starts_with(self.flag_prefix) && (self.space_separated || !name.contains(self.separator))
    }
}

/// Suggestion cache tuning.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long an entry lives after it was last written.
    pub time_to_live_ms: u64,
    /// Reads also extend the lifetime of an entry.
    pub refresh_on_read: bool,
    /// How many trailing characters of the partial value are dropped before
    /// computing a new baseline, so that backtracking still hits the cache.
    pub cutoff_delta: usize,
    /// Entries may be dropped early when the cache grows past `max_entries`.
    pub reclaimable: bool,
    pub max_entries: usize,
    /// How often the background sweeper runs. `0` disables it.
    pub sweep_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> CacheConfig {
        CacheConfig {
            time_to_live_ms: 120_000,
            refresh_on_read: true,
            cutoff_delta: 2,
            reclaimable: false,
            max_entries: 256,
            sweep_interval_ms: 60_000,
        }
    }
}

impl CacheConfig {
    pub fn time_to_live(&self) -> Duration {
        Duration::from_millis(self.time_to_live_ms)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        if self.sweep_interval_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.sweep_interval_ms))
        }
    }
}
