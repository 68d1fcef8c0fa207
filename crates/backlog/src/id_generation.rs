//! Hash-based ID generation for epics and stories.
//!
//! IDs are collision-resistant, human-readable tokens derived from SHA-256
//! and base36 encoding, in the form `{prefix}-{hash}` (e.g. "proj-a3f8").
//! The hash length adapts to database size so small projects get short IDs
//! while large ones keep a low collision probability.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

const BASE36_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const MAX_NONCE: u32 = 100;

/// Errors that can occur during ID generation
#[derive(Debug, Error)]
pub enum IdGenerationError {
    /// Unable to generate a unique ID after exhausting all nonces and length
    /// increases
    #[error("Unable to generate unique ID after {attempts} attempts")]
    CollisionExhausted {
        /// Number of nonces tried
        attempts: u32,
    },

    /// Base36 encoding failed
    #[error("Base36 encoding failed: {0}")]
    EncodingFailed(String),

    /// Invalid length parameter
    #[error("Length must be greater than 0")]
    InvalidLength,
}

/// Configuration for ID generation
#[derive(Debug, Clone)]
pub struct IdGeneratorConfig {
    /// Prefix for all IDs (e.g., "proj")
    pub prefix: String,

    /// Current number of records; drives the adaptive hash length
    pub database_size: usize,
}

/// Hash-based ID generator with collision detection.
///
/// Epic and story IDs share one namespace: the generator tracks every ID it
/// has handed out (or been told about via [`IdGenerator::register_id`]) so a
/// story can never collide with an epic.
pub struct IdGenerator {
    config: IdGeneratorConfig,
    existing_ids: HashSet<String>,
}

impl IdGenerator {
    /// Create a new ID generator with the given configuration
    pub fn new(config: IdGeneratorConfig) -> Self {
        Self {
            config,
            existing_ids: HashSet::new(),
        }
    }

    /// Register an existing ID to prevent collisions
    pub fn register_id(&mut self, id: String) {
        self.existing_ids.insert(id);
    }

    /// The database size the generator was configured with
    #[must_use]
    pub fn database_size(&self) -> usize {
        self.config.database_size
    }

    /// Generate a new unique ID seeded from the record's title and
    /// description.
    ///
    /// # Errors
    ///
    /// Returns an error if no unique ID can be produced after trying all
    /// nonces at the maximum hash length.
    pub fn generate(&mut self, title: &str, description: &str) -> Result<String, IdGenerationError> {
        let id_length = self.adaptive_length();

        for nonce in 0..MAX_NONCE {
            let id = self.generate_hash_id(title, description, nonce, id_length)?;

            if !self.existing_ids.contains(&id) {
                if nonce > 0 {
                    debug!(nonce, id_length, "generated unique ID after collision retries");
                }
                self.existing_ids.insert(id.clone());
                return Ok(id);
            }
        }

        // All nonces collided; widen the hash once before giving up
        if id_length < 6 {
            warn!(
                id_length,
                max_nonce = MAX_NONCE,
                "all nonces exhausted, increasing ID length"
            );
            let longer_id = self.generate_hash_id(title, description, 0, id_length + 1)?;
            self.existing_ids.insert(longer_id.clone());
            return Ok(longer_id);
        }

        Err(IdGenerationError::CollisionExhausted {
            attempts: MAX_NONCE,
        })
    }

    fn generate_hash_id(
        &self,
        title: &str,
        description: &str,
        nonce: u32,
        length: usize,
    ) -> Result<String, IdGenerationError> {
        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let content = format!("{title}|{description}|{timestamp}|{nonce}");

        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        let hash_bytes = hasher.finalize();

        let hash_str = encode_base36(&hash_bytes[..8], length)?;

        Ok(format!("{}-{}", self.config.prefix, hash_str))
    }

    /// Determine hash length based on database size
    ///
    /// - 0-500 records: 4 chars
    /// - 501-1,500: 5 chars
    /// - 1,501+: 6 chars
    fn adaptive_length(&self) -> usize {
        match self.config.database_size {
            0..=500 => 4,
            501..=1500 => 5,
            _ => 6,
        }
    }
}

/// Encode the first bytes of a hash as a base36 string of the given length.
///
/// The input is limited to 8 bytes by the caller so the intermediate value
/// fits a u64; wrapping arithmetic keeps the conversion deterministic.
fn encode_base36(bytes: &[u8], length: usize) -> Result<String, IdGenerationError> {
    if length == 0 {
        return Err(IdGenerationError::InvalidLength);
    }

    let mut num: u64 = 0;
    for &byte in bytes {
        num = num.wrapping_shl(8).wrapping_add(u64::from(byte));
    }

    let mut result = Vec::new();
    let mut n = num;

    while result.len() < length {
        let remainder = (n % 36) as usize;
        result.push(BASE36_CHARS[remainder]);
        n /= 36;
    }

    result.reverse();

    String::from_utf8(result)
        .map_err(|e| IdGenerationError::EncodingFailed(format!("UTF-8 conversion failed: {e}")))
}

/// Validate ID format: `{prefix}-{hash}` with a 4-6 char alphanumeric hash.
#[must_use]
pub fn validate_id(id: &str, prefix: &str) -> bool {
    let Some(hash) = id.strip_prefix(prefix).and_then(|s| s.strip_prefix('-')) else {
        return false;
    };

    if hash.len() < 4 || hash.len() > 6 {
        return false;
    }

    hash.chars().all(|c| c.is_ascii_alphanumeric())
}
