mod binding;
mod capability_probe;
mod cf;
mod error;
mod history;
mod json_contract;
mod loader;
mod logging;
mod path_probe;
mod settings;
mod symbol_codec;
mod trace;

use binding::ServiceBinding;
use capability_probe::{CapabilityProbe, ProbeReport, Verdict};
use clap::{Parser, Subcommand};
use history::{HistoryFile, HistorySink};
use json_contract::{EXIT_INDETERMINATE, EXIT_NEGATIVE, EXIT_OK, EXIT_USAGE, JsonResult};
use loader::{DlLoader, ServiceLibrary, ServiceLoader};
use path_probe::{PathReport, PathVerdict};
use serde::Serialize;
use std::path::{Path, PathBuf};
use trace::Trace;

#[derive(Parser)]
#[command(
    name = "launch-probe",
    version,
    about = "Checks whether a bundle is registered with the launch service, or whether a path exists",
    after_help = "\
notes:
  - every command prints one JSON envelope on stdout; logs go to stderr (LAUNCH_PROBE_LOG=debug)
  - exit codes: 0 present/exists, 3 absent/not found, 4 indeterminate, 2 usage or config error
  - check-bundle relies on a private entry point that only answers on iOS before 18.4.1"
)]
struct Cli {
    /// Directory holding history.json and settings.json
    #[arg(long, global = true, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    /// Do not append this run to the history file
    #[arg(long, global = true)]
    no_history: bool,

    /// Print the envelope on a single line
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask the launch service whether <BUNDLE_ID> is installed
    CheckBundle {
        bundle_id: String,
        #[arg(long)]
        binding: Option<String>,
        /// Load this library instead of the binding's
        #[arg(long, value_name = "PATH")]
        library: Option<String>,
    },
    /// Report whether <PATH> exists and whether it is a file or directory
    CheckPath { path: String },
    /// Show the symbol name a binding decodes to
    DecodeSymbol {
        #[arg(long)]
        binding: Option<String>,
    },
    ListBindings,
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Run the checks enabled in settings.json
    Startup,
}

#[derive(Subcommand)]
enum HistoryAction {
    List,
    Clear,
    RemoveBundle { index: usize },
    RemovePath { index: usize },
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    Set {
        /// Enable the startup bundle check for this identifier
        #[arg(long, value_name = "BUNDLE_ID", conflicts_with = "no_bundle_check")]
        bundle_check: Option<String>,
        /// Enable the startup path check for this path
        #[arg(long, value_name = "PATH", conflicts_with = "no_path_check")]
        path_check: Option<String>,
        #[arg(long)]
        no_bundle_check: bool,
        #[arg(long)]
        no_path_check: bool,
    },
}

#[derive(Serialize)]
struct BundleCheckData {
    bundle_id: String,
    binding: Option<&'static str>,
    library_path: String,
    symbol: Option<String>,
    verdict: Verdict,
    installed: bool,
    return_code: Option<i32>,
    trace: Vec<String>,
}

#[derive(Serialize)]
struct PathCheckData {
    path: String,
    verdict: PathVerdict,
    exists: bool,
    trace: Vec<String>,
}

#[derive(Serialize)]
struct DecodeSymbolData {
    binding: &'static str,
    symbol: Option<String>,
    obfuscated_len: usize,
    key_len: usize,
}

#[derive(Serialize)]
struct BindingSummary {
    #[serde(flatten)]
    binding: ServiceBinding,
    library_present: bool,
}

#[derive(Serialize)]
struct BindingsReport {
    default_binding: &'static str,
    bindings: Vec<BindingSummary>,
}

#[derive(Serialize)]
struct HistoryReport {
    history_path: String,
    empty: bool,
    #[serde(flatten)]
    history: history::GroupedHistory,
}

#[derive(Serialize)]
struct HistoryRemoval {
    history_path: String,
    removed: serde_json::Value,
}

#[derive(Serialize)]
struct SettingsReport {
    settings_path: String,
    settings: settings::Settings,
}

#[derive(Serialize)]
struct StartupReport {
    bundle_check: Option<BundleCheckData>,
    path_check: Option<PathCheckData>,
    skipped: Vec<String>,
    trace: Vec<String>,
}

fn emit_envelope<T: Serialize>(kind: &str, result: JsonResult, data: &T, compact: bool) {
    if let Err(err) = json_contract::print_envelope(kind, result, data, compact) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn exit_with(code: i32) {
    if code != EXIT_OK {
        std::process::exit(code);
    }
}

fn fail_usage(err: impl std::fmt::Display) -> ! {
    eprintln!("{err}");
    std::process::exit(EXIT_USAGE);
}

fn state_dir(cli: &Cli) -> PathBuf {
    settings::resolve_state_dir(cli.state_dir.as_deref()).unwrap_or_else(|err| fail_usage(err))
}

fn select_binding(id: Option<&str>) -> &'static ServiceBinding {
    match id {
        None => binding::default_binding(),
        Some(id) => binding::find_binding(id).unwrap_or_else(|| {
            let known: Vec<&str> = binding::BINDINGS.iter().map(|b| b.id).collect();
            fail_usage(format!("unknown binding: {id} (known: {})", known.join(", ")))
        }),
    }
}

/// History is best effort: a broken history file never blocks a probe.
fn history_sink(cli: &Cli) -> Box<dyn HistorySink> {
    if cli.no_history {
        return Box::new(history::Discard);
    }
    let dir = match settings::resolve_state_dir(cli.state_dir.as_deref()) {
        Ok(dir) => dir,
        Err(err) => {
            tracing::warn!(error = %err, "no state directory; this run will not be recorded");
            return Box::new(history::Discard);
        }
    };
    let path = settings::history_path(&dir);
    match HistoryFile::open(&path) {
        Ok(file) => Box::new(file),
        Err(err) => {
            tracing::warn!(error = %err, "history unavailable; this run will not be recorded");
            Box::new(history::Discard)
        }
    }
}

fn open_history_file(cli: &Cli) -> (HistoryFile, PathBuf) {
    let path = settings::history_path(&state_dir(cli));
    let file = HistoryFile::open(&path).unwrap_or_else(|err| fail_usage(err));
    (file, path)
}

fn verdict_exit_code(verdict: Verdict) -> i32 {
    match verdict {
        Verdict::Present => EXIT_OK,
        Verdict::Absent => EXIT_NEGATIVE,
        Verdict::Indeterminate => EXIT_INDETERMINATE,
    }
}

fn path_exit_code(verdict: PathVerdict) -> i32 {
    if verdict.exists() { EXIT_OK } else { EXIT_NEGATIVE }
}

fn run_bundle_check(
    binding: &'static ServiceBinding,
    library_override: Option<&str>,
    bundle_id: &str,
    sink: &mut dyn HistorySink,
) -> (BundleCheckData, JsonResult) {
    let probe = CapabilityProbe::for_binding(DlLoader, binding);
    let report = match library_override {
        Some(library) => probe.invoke(library, binding.obfuscated_symbol, binding.key, bundle_id),
        None => probe.probe_binding(binding, bundle_id),
    };
    if let Err(err) = sink.record_bundle(bundle_id, report.verdict.as_bool()) {
        tracing::warn!(error = %err, "failed to record bundle check");
    }
    bundle_envelope(binding, report)
}

fn bundle_envelope(binding: &'static ServiceBinding, report: ProbeReport) -> (BundleCheckData, JsonResult) {
    let outcome = match &report.error {
        Some(err) => err.outcome(),
        None => report.verdict.as_str(),
    };
    let result = JsonResult::from_ok(report.verdict.as_bool())
        .with_exit_code(verdict_exit_code(report.verdict))
        .with_outcome(outcome)
        .with_rc(report.return_code)
        .with_error(report.error.as_ref().map(ToString::to_string));
    let data = BundleCheckData {
        bundle_id: report.target_id,
        binding: Some(binding.id),
        library_path: report.library_path,
        symbol: report.symbol,
        verdict: report.verdict,
        installed: report.verdict.as_bool(),
        return_code: report.return_code,
        trace: report.trace.into_entries(),
    };
    (data, result)
}

fn run_path_check(path: &str, sink: &mut dyn HistorySink) -> (PathCheckData, JsonResult) {
    let PathReport {
        path,
        verdict,
        trace,
    } = path_probe::check(path);
    if let Err(err) = sink.record_path(&path, verdict.exists()) {
        tracing::warn!(error = %err, "failed to record path check");
    }
    let result = JsonResult::from_ok(verdict.exists())
        .with_exit_code(path_exit_code(verdict))
        .with_outcome(verdict.as_str());
    let data = PathCheckData {
        path,
        exists: verdict.exists(),
        verdict,
        trace: trace.into_entries(),
    };
    (data, result)
}

fn build_bindings_report() -> BindingsReport {
    BindingsReport {
        default_binding: binding::default_binding().id,
        bindings: binding::BINDINGS
            .iter()
            .map(|binding| BindingSummary {
                binding: *binding,
                library_present: library_loads(&DlLoader, binding.library_path),
            })
            .collect(),
    }
}

/// Private frameworks may only exist inside the dyld shared cache, so ask the loader.
fn library_loads<L: ServiceLoader>(loader: &L, path: &str) -> bool {
    match loader.load(path) {
        Ok(library) => {
            if let Err(err) = library.close() {
                tracing::warn!(library = path, error = %err, "library release failed");
            }
            true
        }
        Err(err) => {
            tracing::debug!(library = path, error = %err, "library not loadable");
            false
        }
    }
}

fn startup_path_line(path: &str, exists: bool) -> String {
    let status = if exists { "Exists" } else { "Not found" };
    format!("Launch File Check: {path}: {status}")
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

fn main() {
    logging::init();
    let cli = Cli::parse();

    match &cli.command {
        Command::CheckBundle {
            bundle_id,
            binding,
            library,
        } => {
            if bundle_id.is_empty() {
                fail_usage("bundle id must not be empty");
            }
            let binding = select_binding(binding.as_deref());
            let mut sink = history_sink(&cli);
            let (data, result) =
                run_bundle_check(binding, library.as_deref(), bundle_id, sink.as_mut());
            let code = result.exit_code.unwrap_or(EXIT_OK);
            emit_envelope("bundle_check_report", result, &data, cli.compact);
            exit_with(code);
        }
        Command::CheckPath { path } => {
            let mut sink = history_sink(&cli);
            let (data, result) = run_path_check(path, sink.as_mut());
            let code = result.exit_code.unwrap_or(EXIT_OK);
            emit_envelope("path_check_report", result, &data, cli.compact);
            exit_with(code);
        }
        Command::DecodeSymbol { binding } => {
            let binding = select_binding(binding.as_deref());
            let decoded = symbol_codec::decode(binding.obfuscated_symbol, binding.key);
            let (result, symbol) = match decoded {
                Ok(symbol) => (JsonResult::from_ok(true), Some(symbol)),
                Err(err) => (
                    JsonResult::from_ok(false)
                        .with_exit_code(EXIT_INDETERMINATE)
                        .with_outcome("decode_error")
                        .with_error(Some(err.to_string())),
                    None,
                ),
            };
            let code = result.exit_code.unwrap_or(EXIT_OK);
            let data = DecodeSymbolData {
                binding: binding.id,
                symbol,
                obfuscated_len: binding.obfuscated_symbol.len(),
                key_len: binding.key.len(),
            };
            emit_envelope("decode_symbol_report", result, &data, cli.compact);
            exit_with(code);
        }
        Command::ListBindings => {
            let report = build_bindings_report();
            emit_envelope("bindings_report", JsonResult::from_ok(true), &report, cli.compact);
        }
        Command::History { action } => match action.as_ref().unwrap_or(&HistoryAction::List) {
            HistoryAction::List => {
                let (file, path) = open_history_file(&cli);
                let report = HistoryReport {
                    history_path: display_path(&path),
                    empty: file.is_empty(),
                    history: file.grouped(),
                };
                emit_envelope("history_report", JsonResult::from_ok(true), &report, cli.compact);
            }
            HistoryAction::Clear => {
                let (mut file, path) = open_history_file(&cli);
                file.clear().unwrap_or_else(|err| fail_usage(err));
                let report = HistoryReport {
                    history_path: display_path(&path),
                    empty: true,
                    history: file.grouped(),
                };
                emit_envelope("history_report", JsonResult::from_ok(true), &report, cli.compact);
            }
            HistoryAction::RemoveBundle { index } => {
                let (mut file, path) = open_history_file(&cli);
                let removed = file.remove_bundle(*index).unwrap_or_else(|err| fail_usage(err));
                let report = HistoryRemoval {
                    history_path: display_path(&path),
                    removed: serde_json::to_value(removed).unwrap_or_default(),
                };
                emit_envelope("history_removal", JsonResult::from_ok(true), &report, cli.compact);
            }
            HistoryAction::RemovePath { index } => {
                let (mut file, path) = open_history_file(&cli);
                let removed = file.remove_path(*index).unwrap_or_else(|err| fail_usage(err));
                let report = HistoryRemoval {
                    history_path: display_path(&path),
                    removed: serde_json::to_value(removed).unwrap_or_default(),
                };
                emit_envelope("history_removal", JsonResult::from_ok(true), &report, cli.compact);
            }
        },
        Command::Settings { action } => {
            let settings_path = settings::settings_path(&state_dir(&cli));
            let mut current =
                settings::load_settings(&settings_path).unwrap_or_else(|err| fail_usage(err));
            if let SettingsAction::Set {
                bundle_check,
                path_check,
                no_bundle_check,
                no_path_check,
            } = action
            {
                if let Some(bundle_id) = bundle_check {
                    current.launch_check_enabled = true;
                    current.launch_check_bundle_id = bundle_id.clone();
                }
                if *no_bundle_check {
                    current.launch_check_enabled = false;
                }
                if let Some(path) = path_check {
                    current.launch_check_file_enabled = true;
                    current.launch_check_file_path = path.clone();
                }
                if *no_path_check {
                    current.launch_check_file_enabled = false;
                }
                settings::save_settings(&settings_path, &current)
                    .unwrap_or_else(|err| fail_usage(err));
            }
            let report = SettingsReport {
                settings_path: display_path(&settings_path),
                settings: current,
            };
            emit_envelope("settings_report", JsonResult::from_ok(true), &report, cli.compact);
        }
        Command::Startup => {
            let settings_path = settings::settings_path(&state_dir(&cli));
            let current =
                settings::load_settings(&settings_path).unwrap_or_else(|err| fail_usage(err));
            let mut sink = history_sink(&cli);
            let mut skipped = Vec::new();
            let mut trace = Trace::new();
            let mut code = EXIT_OK;

            let bundle_check = match current.startup_bundle_id() {
                Some(bundle_id) => {
                    tracing::info!(bundle_id, "running startup bundle check");
                    trace.push(format!("Launch Check: {bundle_id}"));
                    let (data, result) = run_bundle_check(
                        binding::default_binding(),
                        None,
                        bundle_id,
                        sink.as_mut(),
                    );
                    code = code.max(result.exit_code.unwrap_or(EXIT_OK));
                    Some(data)
                }
                None => {
                    skipped.push("bundle_check".to_string());
                    None
                }
            };
            let path_check = match current.startup_path() {
                Some(path) => {
                    tracing::info!(path, "running startup path check");
                    let (data, result) = run_path_check(path, sink.as_mut());
                    trace.push(startup_path_line(path, data.exists));
                    code = code.max(result.exit_code.unwrap_or(EXIT_OK));
                    Some(data)
                }
                None => {
                    skipped.push("path_check".to_string());
                    None
                }
            };

            let result = JsonResult::from_ok(code == EXIT_OK).with_exit_code(code);
            let report = StartupReport {
                bundle_check,
                path_check,
                skipped,
                trace: trace.into_entries(),
            };
            emit_envelope("startup_report", result, &report, cli.compact);
            exit_with(code);
        }
    }
}
