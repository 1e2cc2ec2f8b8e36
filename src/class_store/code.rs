//! # Class Codes
//!
//! A class is addressed by a zero-padded 5-digit decimal code (`00000`-`99999`).
//! The generator samples the code space uniformly and leaves uniqueness to the
//! backend: either a predicate over live keys (in-memory) or an atomic
//! insert-if-absent that doubles as the existence test (PostgreSQL).

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::errors::{StoreError, StoreResult};

/// Number of digits in a class code
pub const CODE_LENGTH: usize = 5;

/// Size of the code space (`10^CODE_LENGTH`)
pub const CODE_SPACE: u32 = 100_000;

/// Attempt budget for backends with an in-process existence check
pub const MEMORY_MAX_ATTEMPTS: u32 = 10_000;

/// Attempt budget for backends that pay a round trip per attempt
pub const POSTGRES_MAX_ATTEMPTS: u32 = 1_000;

/// Rejected class code input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid class code '{0}': expected {CODE_LENGTH} decimal digits")]
pub struct InvalidClassCode(pub String);

/// A validated 5-digit class code
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClassCode(String);

impl ClassCode {
    /// Parse and validate a code string
    pub fn parse(s: &str) -> Result<Self, InvalidClassCode> {
        if s.len() == CODE_LENGTH && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidClassCode(s.to_string()))
        }
    }

    /// Build a code from its numeric value, zero-padded
    pub fn from_number(n: u32) -> Option<Self> {
        if n < CODE_SPACE {
            Some(Self(format!("{:05}", n)))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ClassCode {
    type Err = InvalidClassCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ClassCode {
    type Error = InvalidClassCode;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ClassCode> for String {
    fn from(code: ClassCode) -> Self {
        code.0
    }
}

impl AsRef<str> for ClassCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Random class code generator with a bounded retry budget
#[derive(Debug, Clone, Copy)]
pub struct CodeGenerator {
    max_attempts: u32,
}

impl CodeGenerator {
    /// Create a generator with the given attempt budget (at least one attempt)
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Generator tuned for the in-memory backend
    pub fn for_memory() -> Self {
        Self::new(MEMORY_MAX_ATTEMPTS)
    }

    /// Generator tuned for the PostgreSQL backend
    pub fn for_postgres() -> Self {
        Self::new(POSTGRES_MAX_ATTEMPTS)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Draw one code uniformly from the code space
    pub fn sample() -> ClassCode {
        let n = rand::thread_rng().gen_range(0..CODE_SPACE);
        ClassCode(format!("{:05}", n))
    }

    /// Sample until `is_taken` reports a free code.
    pub fn generate<F>(&self, mut is_taken: F) -> StoreResult<ClassCode>
    where
        F: FnMut(&ClassCode) -> bool,
    {
        for attempt in 1..=self.max_attempts {
            let code = Self::sample();
            if !is_taken(&code) {
                if attempt > 1 {
                    debug!(code = %code, attempt, "class code collision resolved");
                }
                return Ok(code);
            }
        }

        warn!(attempts = self.max_attempts, "class code space exhausted");
        Err(StoreError::CodeSpaceExhausted {
            attempts: self.max_attempts,
        })
    }

    /// Sample until `try_reserve` atomically claims a code.
    ///
    /// `try_reserve` returns `Ok(true)` once the code is reserved and `Ok(false)`
    /// on collision. Any error aborts the loop and is returned unchanged.
    pub async fn reserve_with<F, Fut>(&self, mut try_reserve: F) -> StoreResult<ClassCode>
    where
        F: FnMut(ClassCode) -> Fut,
        Fut: Future<Output = StoreResult<bool>>,
    {
        for attempt in 1..=self.max_attempts {
            let code = Self::sample();
            if try_reserve(code.clone()).await? {
                if attempt > 1 {
                    debug!(code = %code, attempt, "class code collision resolved");
                }
                return Ok(code);
            }
        }

        warn!(attempts = self.max_attempts, "class code space exhausted");
        Err(StoreError::CodeSpaceExhausted {
            attempts: self.max_attempts,
        })
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::for_memory()
    }
}
