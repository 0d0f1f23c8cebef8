//! Asks the platform launch service whether a bundle identifier is installed.
//!
//! A probe runs decode → load → resolve → launch → classify and stops at the
//! first failure. Whatever happens, the caller gets a verdict and a trace
//! explaining how it was reached; nothing is propagated as an error.

use crate::binding::{ReturnCodes, ServiceBinding};
use crate::error::ProbeError;
use crate::loader::{LaunchEntry, ServiceLibrary, ServiceLoader};
use crate::symbol_codec;
use crate::trace::Trace;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Present,
    Absent,
    Indeterminate,
}

impl Verdict {
    pub fn classify(code: i32, codes: &ReturnCodes) -> Verdict {
        if code == codes.present {
            Verdict::Present
        } else if code == codes.absent {
            Verdict::Absent
        } else {
            Verdict::Indeterminate
        }
    }

    /// Display/history view: anything but `Present` counts as not installed.
    pub fn as_bool(self) -> bool {
        self == Verdict::Present
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Present => "present",
            Verdict::Absent => "absent",
            Verdict::Indeterminate => "indeterminate",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub target_id: String,
    pub library_path: String,
    pub symbol: Option<String>,
    pub return_code: Option<i32>,
    pub verdict: Verdict,
    pub error: Option<ProbeError>,
    pub trace: Trace,
}

pub struct CapabilityProbe<L> {
    loader: L,
    codes: ReturnCodes,
}

impl<L: ServiceLoader> CapabilityProbe<L> {
    pub fn new(loader: L, codes: ReturnCodes) -> Self {
        CapabilityProbe { loader, codes }
    }

    pub fn for_binding(loader: L, binding: &ServiceBinding) -> Self {
        Self::new(loader, binding.codes)
    }

    pub fn probe_binding(&self, binding: &ServiceBinding, target_id: &str) -> ProbeReport {
        self.invoke(
            binding.library_path,
            binding.obfuscated_symbol,
            binding.key,
            target_id,
        )
    }

    pub fn invoke(
        &self,
        library_path: &str,
        obfuscated_symbol: &[u8],
        key: &[u8],
        target_id: &str,
    ) -> ProbeReport {
        let mut report = ProbeReport {
            target_id: target_id.to_string(),
            library_path: library_path.to_string(),
            symbol: None,
            return_code: None,
            verdict: Verdict::Indeterminate,
            error: None,
            trace: Trace::new(),
        };

        let symbol = match symbol_codec::decode(obfuscated_symbol, key) {
            Ok(name) => {
                report.trace.push(format!("Using API {name}"));
                name
            }
            Err(err) => {
                report.trace.push(format!("Failed to deobfuscate name: {err}"));
                return self.finish(report, Some(err.into()));
            }
        };
        report.symbol = Some(symbol.clone());

        let library = match self.loader.load(library_path) {
            Ok(library) => library,
            Err(err) => {
                report.trace.push(format!("dlopen failed: {}", failure_reason(&err)));
                return self.finish(report, Some(err));
            }
        };
        let library_name = library_label(library_path);
        report.trace.push(format!("Loaded {library_name}"));

        let outcome = call_entry(&library, &symbol, target_id, &mut report.trace);

        match library.close() {
            Ok(()) => report.trace.push(format!("Released {library_name}")),
            Err(err) => {
                tracing::warn!(library = %library_path, error = %err, "library release failed");
                report.trace.push(format!("dlclose failed: {}", failure_reason(&err)));
            }
        }

        let code = match outcome {
            Ok(code) => code,
            Err(err) => return self.finish(report, Some(err)),
        };
        report.return_code = Some(code);
        report.verdict = Verdict::classify(code, &self.codes);
        if report.verdict == Verdict::Indeterminate {
            report
                .trace
                .push(format!("Unexpected code {code}; assuming not installed"));
            return self.finish(report, Some(ProbeError::UnexpectedReturnCode(code)));
        }
        self.finish(report, None)
    }

    fn finish(&self, mut report: ProbeReport, error: Option<ProbeError>) -> ProbeReport {
        if error.is_some() {
            report.verdict = Verdict::Indeterminate;
        }
        report.error = error;
        report
            .trace
            .push(format!("Verdict: {}", report.verdict.as_str()));
        tracing::info!(
            target_id = %report.target_id,
            verdict = report.verdict.as_str(),
            return_code = ?report.return_code,
            "capability probe finished"
        );
        report
    }
}

/// Resolve and call. The resolved entry borrows `library` and is dropped here,
/// before the caller releases the handle.
fn call_entry<S: ServiceLibrary>(
    library: &S,
    symbol: &str,
    target_id: &str,
    trace: &mut Trace,
) -> Result<i32, ProbeError> {
    let entry = match library.resolve(symbol) {
        Ok(entry) => entry,
        Err(err) => {
            trace.push(format!("dlsym error: {}", failure_reason(&err)));
            return Err(err);
        }
    };
    trace.push("Symbol resolved");

    match entry.launch(target_id) {
        Ok(code) => {
            trace.push(format!("API returned code: {code}"));
            Ok(code)
        }
        Err(err) => {
            trace.push(format!("Failed to marshal arguments: {}", failure_reason(&err)));
            Err(err)
        }
    }
}

fn failure_reason(err: &ProbeError) -> String {
    match err {
        ProbeError::Load { reason, .. }
        | ProbeError::Resolve { reason, .. }
        | ProbeError::Release { reason } => reason.clone(),
        ProbeError::Argument(reason) => reason.clone(),
        other => other.to_string(),
    }
}

fn library_label(library_path: &str) -> String {
    Path::new(library_path)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| library_path.to_string())
}
