#[path = "../json_contract.rs"]
#[allow(dead_code)]
mod json_contract;
#[path = "../symbol_codec.rs"]
mod symbol_codec;

use clap::{Parser, Subcommand};
use json_contract::{EXIT_INDETERMINATE, JsonResult};
use serde::Serialize;

const DEFAULT_KEY: &str = "94826663";

#[derive(Parser)]
#[command(
    name = "symbol-codec",
    about = "Produces and inspects XOR-obfuscated symbol constants",
    after_help = "\
notes:
  - encode prints the bytes as hex and as a Rust slice literal ready to paste into a binding
  - the transform is its own inverse; this is obfuscation, not encryption"
)]
struct Cli {
    /// ASCII key applied cyclically
    #[arg(long, global = true, default_value = DEFAULT_KEY)]
    key: String,

    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Encode { text: String },
    Decode { hex: String },
}

#[derive(Serialize)]
struct CodecData {
    key_len: usize,
    text: Option<String>,
    hex: String,
    rust_literal: String,
}

fn rust_literal(bytes: &[u8]) -> String {
    let body = bytes
        .chunks(15)
        .map(|chunk| {
            let line = chunk
                .iter()
                .map(|b| format!("0x{b:02x},"))
                .collect::<Vec<_>>()
                .join(" ");
            format!("    {line}")
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("&[\n{body}\n]")
}

fn failure(err: impl ToString) -> JsonResult {
    JsonResult::from_ok(false)
        .with_exit_code(EXIT_INDETERMINATE)
        .with_outcome("decode_error")
        .with_error(Some(err.to_string()))
}

fn run(cli: &Cli) -> (JsonResult, CodecData) {
    let key = cli.key.as_bytes();
    match &cli.command {
        Command::Encode { text } => match symbol_codec::encode(text, key) {
            Ok(bytes) => (
                JsonResult::from_ok(true),
                CodecData {
                    key_len: key.len(),
                    text: Some(text.clone()),
                    hex: hex::encode(&bytes),
                    rust_literal: rust_literal(&bytes),
                },
            ),
            Err(err) => (
                failure(err),
                CodecData {
                    key_len: key.len(),
                    text: Some(text.clone()),
                    hex: String::new(),
                    rust_literal: String::new(),
                },
            ),
        },
        Command::Decode { hex: input } => {
            let cleaned: String = input
                .replace("0x", "")
                .replace("0X", "")
                .chars()
                .filter(|c| c.is_ascii_hexdigit())
                .collect();
            let mut data = CodecData {
                key_len: key.len(),
                text: None,
                hex: cleaned.clone(),
                rust_literal: String::new(),
            };
            let bytes = match hex::decode(&cleaned) {
                Ok(bytes) => bytes,
                Err(err) => return (failure(format!("invalid hex: {err}")), data),
            };
            data.rust_literal = rust_literal(&bytes);
            match symbol_codec::decode(&bytes, key) {
                Ok(text) => {
                    data.text = Some(text);
                    (JsonResult::from_ok(true), data)
                }
                Err(err) => (failure(err), data),
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let (result, data) = run(&cli);
    let exit_code = result.exit_code.unwrap_or(0);
    if let Err(err) = json_contract::print_envelope("symbol_codec_report", result, &data, cli.compact) {
        eprintln!("{err}");
        std::process::exit(1);
    }
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}
