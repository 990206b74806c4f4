//! Exit codes following sysexits.h conventions.
//!
//! Scripts can tell a missing file from an undecodable one, and a failed
//! `compare --check` from both.

use mediasearch_core::MediaSearchError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// `compare --check` found no alike fingerprint pair.
/// clap already exits with 2 on argument errors.
pub const NOT_ALIKE: i32 = 3;

/// Invalid input such as an unsupported URL scheme.
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Media could not be decoded or fingerprinted.
/// Maps to EX_DATAERR from sysexits.h.
pub const HASH_FAILED: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Remote media unavailable.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");
        let core = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<MediaSearchError>());

        let code = match core {
            Some(MediaSearchError::Validation(_)) => USAGE_ERROR,
            Some(MediaSearchError::Hash(_)) => HASH_FAILED,
            Some(MediaSearchError::Fetch(detail))
                if detail.starts_with("Failed to stat") || detail.starts_with("Failed to read") =>
            {
                INPUT_ERROR
            }
            Some(MediaSearchError::Fetch(_)) => NETWORK_ERROR,
            _ => GENERAL_ERROR,
        };

        Self {
            code,
            message: Some(message),
        }
    }
}
