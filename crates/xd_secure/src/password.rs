//! Password generation from a pool of enabled character classes.
//!
//! The pool is the concatenation of the enabled classes in a fixed order
//! (upper, lower, digits, symbols). Each output character is drawn
//! independently and uniformly from the pool with a cryptographically secure
//! generator, so a password carries no guarantee of containing every class.

use http::StatusCode;
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::error::ResponseError;

pub const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
pub const DIGITS: &str = "0123456789";
pub const SYMBOLS: &str = "!@#$%^&*()_+-=[]{};:,.<>?";

pub const MIN_LENGTH: usize = 4;
pub const MAX_LENGTH: usize = 128;
pub const DEFAULT_LENGTH: i64 = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PasswordError {
    #[error("Select at least one character set")]
    EmptyPool,

    #[error("Invalid length: {0:?}")]
    InvalidLength(String),
}

impl ResponseError for PasswordError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

/// What to generate. Deserializes from the `/generate` request body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    #[serde(deserialize_with = "length_field")]
    pub length: Length,
    #[serde(deserialize_with = "flag_field")]
    pub upper: bool,
    #[serde(deserialize_with = "flag_field")]
    pub lower: bool,
    #[serde(deserialize_with = "flag_field")]
    pub numbers: bool,
    #[serde(deserialize_with = "flag_field")]
    pub symbols: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            length: Length::Requested(DEFAULT_LENGTH),
            upper: true,
            lower: true,
            numbers: true,
            symbols: true,
        }
    }
}

/// The requested length as received. Browsers post form values as strings,
/// so a string that is not a whole number is kept and rejected at generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Length {
    Requested(i64),
    Unparsable(String),
}

impl Length {
    fn resolve(&self) -> Result<usize, PasswordError> {
        match self {
            Length::Requested(n) => Ok(clamp_length(*n)),
            Length::Unparsable(raw) => Err(PasswordError::InvalidLength(raw.clone())),
        }
    }
}

fn length_field<'de, D>(deserializer: D) -> Result<Length, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        UInt(u64),
        Float(f64),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Int(n) => Length::Requested(n),
        Raw::UInt(n) => Length::Requested(i64::try_from(n).unwrap_or(i64::MAX)),
        // truncates toward zero and saturates at the i64 bounds
        Raw::Float(f) => Length::Requested(f as i64),
        Raw::Text(s) => match s.trim().parse::<i64>() {
            Ok(n) => Length::Requested(n),
            Err(_) => Length::Unparsable(s),
        },
    })
}

/// A class flag is enabled by any JSON value except `null`, `false`, `0`,
/// `""`, `[]` and `{}`.
fn flag_field<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;

    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    })
}

/// Clamp a requested length into `[MIN_LENGTH, MAX_LENGTH]`.
pub fn clamp_length(requested: i64) -> usize {
    // both bounds fit in i64 and the clamped value is non-negative
    requested.clamp(MIN_LENGTH as i64, MAX_LENGTH as i64) as usize
}

/// The characters eligible for selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool(Vec<u8>);

impl Pool {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn contains(&self, c: char) -> bool {
        c.is_ascii() && self.0.contains(&(c as u8))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub fn build_pool(options: &GenerateOptions) -> Result<Pool, PasswordError> {
    let classes = [
        (options.upper, UPPERCASE),
        (options.lower, LOWERCASE),
        (options.numbers, DIGITS),
        (options.symbols, SYMBOLS),
    ];
    let pool: Vec<u8> = classes
        .iter()
        .filter(|(enabled, _)| *enabled)
        .flat_map(|(_, chars)| chars.bytes())
        .collect();

    if pool.is_empty() {
        return Err(PasswordError::EmptyPool);
    }
    Ok(Pool(pool))
}

/// Generate a password with the thread-local CSPRNG.
pub fn generate(options: &GenerateOptions) -> Result<String, PasswordError> {
    generate_with(options, &mut rand::rng())
}

/// Generate a password drawing from `rng`.
pub fn generate_with<R>(options: &GenerateOptions, rng: &mut R) -> Result<String, PasswordError>
where
    R: Rng + CryptoRng,
{
    let pool = build_pool(options)?;
    let length = options.length.resolve()?;
    let chars = pool.as_bytes();

    Ok((0..length)
        .map(|_| chars[rng.random_range(0..chars.len())] as char)
        .collect())
}
