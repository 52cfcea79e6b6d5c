//! Configuration for the hash index.

use std::env;

/// Default base-2 logarithm of the table size (65536 buckets).
pub const DEFAULT_HASH_POWER: u8 = 16;

/// Largest accepted table power. Expansion stops doubling at this size.
pub const MAX_HASH_POWER: u8 = 48;

/// Default number of old-table buckets migrated per global-lock
/// acquisition.
pub const DEFAULT_BULK_MOVE: usize = 1;

/// Default base-2 logarithm of the lock-stripe count.
pub const DEFAULT_LOCK_POWER: u8 = 10;

/// Environment variable that overrides the migration batch size.
pub const BULK_MOVE_ENV: &str = "OXIHASH_BULK_MOVE";

/// Errors returned by configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid value for a configuration key.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Raw value string.
        value: String,
    },
}

/// Configuration for a [`HashIndex`](crate::HashIndex).
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Initial table power; the table starts with `1 << initial_power`
    /// buckets. Typical production values are 12 to 48.
    pub initial_power: u8,
    /// Number of old-table buckets migrated per global-lock acquisition
    /// during expansion.
    pub bulk_move: usize,
    /// Base-2 logarithm of the lock-stripe count. Clamped to the initial
    /// power at construction so every key of a bucket shares a stripe.
    pub lock_power: u8,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            initial_power: DEFAULT_HASH_POWER,
            bulk_move: DEFAULT_BULK_MOVE,
            lock_power: DEFAULT_LOCK_POWER,
        }
    }
}

impl IndexConfig {
    /// Create a configuration with the given initial power.
    ///
    /// A power of zero selects the default ([`DEFAULT_HASH_POWER`]).
    pub fn new(initial_power: u8) -> Self {
        Self::default().with_initial_power(initial_power)
    }

    /// Set the initial table power. Zero selects the default.
    pub fn with_initial_power(mut self, power: u8) -> Self {
        self.initial_power = if power == 0 { DEFAULT_HASH_POWER } else { power };
        self
    }

    /// Set the migration batch size. Zero selects the default.
    pub fn with_bulk_move(mut self, bulk_move: usize) -> Self {
        self.bulk_move = if bulk_move == 0 { DEFAULT_BULK_MOVE } else { bulk_move };
        self
    }

    /// Set the lock-stripe power.
    pub fn with_lock_power(mut self, lock_power: u8) -> Self {
        self.lock_power = lock_power;
        self
    }

    /// Load the default configuration, then apply the [`BULK_MOVE_ENV`]
    /// override if it is set.
    ///
    /// The variable is parsed as a positive integer; `0` or an unset
    /// variable means the default batch size.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(value) = env::var(BULK_MOVE_ENV) {
            config.bulk_move = parse_bulk_move(&value)?;
        }
        Ok(config)
    }
}

fn parse_bulk_move(value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(0) => Ok(DEFAULT_BULK_MOVE),
        Ok(n) => Ok(n),
        Err(_) => Err(ConfigError::InvalidValue {
            key: BULK_MOVE_ENV.to_string(),
            value: value.to_string(),
        }),
    }
}
