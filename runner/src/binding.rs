//! Native signatures and per-OS-version constants for the launch service.
//!
//! The symbol identity, its calling convention and the meaning of its return
//! codes were established for a narrow range of OS releases. Each supported
//! range gets its own [`ServiceBinding`]; nothing here is assumed to hold
//! outside the range it names.

use serde::Serialize;
use std::ffi::c_void;

/// `SBSLaunchApplicationWithIdentifierAndURLAndLaunchOptions(
///     CFStringRef identifier, CFURLRef url /* nullable */,
///     CFDictionaryRef params, CFDictionaryRef options) -> int32_t`
///
/// Both dictionaries must be non-null; pass empty dictionaries when there is
/// nothing to send.
pub type LaunchFn = unsafe extern "C" fn(
    identifier: *const c_void,
    url: *const c_void,
    params: *const c_void,
    options: *const c_void,
) -> i32;

pub const SYMBOL_KEY: &[u8] = b"94826663";

pub const SPRINGBOARD_SERVICES_PATH: &str =
    "/System/Library/PrivateFrameworks/SpringBoardServices.framework/SpringBoardServices";

/// `SBSLaunchApplicationWithIdentifierAndURLAndLaunchOptions` XOR [`SYMBOL_KEY`].
/// Regenerate with `symbol-codec encode <name>`.
pub const SBS_LAUNCH_SYMBOL: &[u8] = &[
    0x6a, 0x76, 0x6b, 0x7e, 0x57, 0x43, 0x58, 0x50, 0x51, 0x75, 0x48, 0x42, 0x5a, 0x5f, 0x55,
    0x52, 0x4d, 0x5d, 0x57, 0x5c, 0x61, 0x5f, 0x42, 0x5b, 0x70, 0x50, 0x5d, 0x5c, 0x42, 0x5f,
    0x50, 0x5a, 0x5c, 0x46, 0x79, 0x5c, 0x52, 0x63, 0x64, 0x7f, 0x78, 0x5a, 0x5c, 0x7e, 0x57,
    0x43, 0x58, 0x50, 0x51, 0x7b, 0x48, 0x46, 0x5f, 0x59, 0x58, 0x40,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReturnCodes {
    pub present: i32,
    pub absent: i32,
}

impl Default for ReturnCodes {
    fn default() -> Self {
        ReturnCodes {
            present: 9,
            absent: 7,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ServiceBinding {
    pub id: &'static str,
    pub platform: &'static str,
    /// Releases before this version answer with the codes below.
    pub fixed_in: &'static str,
    pub library_path: &'static str,
    #[serde(skip)]
    pub obfuscated_symbol: &'static [u8],
    #[serde(skip)]
    pub key: &'static [u8],
    pub codes: ReturnCodes,
}

pub const BINDINGS: &[ServiceBinding] = &[ServiceBinding {
    id: "sbs-launch",
    platform: "iOS",
    fixed_in: "18.4.1",
    library_path: SPRINGBOARD_SERVICES_PATH,
    obfuscated_symbol: SBS_LAUNCH_SYMBOL,
    key: SYMBOL_KEY,
    codes: ReturnCodes {
        present: 9,
        absent: 7,
    },
}];

pub fn default_binding() -> &'static ServiceBinding {
    &BINDINGS[0]
}

pub fn find_binding(id: &str) -> Option<&'static ServiceBinding> {
    BINDINGS.iter().find(|binding| binding.id == id)
}
