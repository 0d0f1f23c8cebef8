use crate::symbol_codec::DecodeError;
use thiserror::Error;

/// Every way a capability probe can fail to reach a conclusive verdict.
///
/// None of these escape `CapabilityProbe::invoke`; they are recorded in the
/// report next to an `Indeterminate` verdict. A fault inside the foreign call
/// itself (wrong ABI for the running OS) is not representable here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("failed to deobfuscate name: {0}")]
    Decode(#[from] DecodeError),

    #[error("failed to load {path}: {reason}")]
    Load { path: String, reason: String },

    #[error("failed to resolve {symbol}: {reason}")]
    Resolve { symbol: String, reason: String },

    #[error("failed to build native arguments: {0}")]
    Argument(String),

    #[error("unexpected return code {0}")]
    UnexpectedReturnCode(i32),

    #[error("failed to release library: {reason}")]
    Release { reason: String },
}

impl ProbeError {
    /// Stable identifier used as `normalized_outcome` in JSON output.
    pub fn outcome(&self) -> &'static str {
        match self {
            ProbeError::Decode(_) => "decode_error",
            ProbeError::Load { .. } => "load_error",
            ProbeError::Resolve { .. } => "resolve_error",
            ProbeError::Argument(_) => "argument_error",
            ProbeError::UnexpectedReturnCode(_) => "unexpected_return_code",
            ProbeError::Release { .. } => "release_error",
        }
    }
}
