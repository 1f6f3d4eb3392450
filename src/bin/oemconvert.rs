// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # oemconvert
//!
//! Convert a file of OEM receiver logs between wire formats.
//!
//! ```sh
//! oemconvert messages.json receiver.gps --format ascii
//! oemconvert messages.json receiver.gps --format binary --unknown
//! oemconvert messages.json receiver.gps --append extra.json
//! ```
//!
//! Writes `<input>.<FORMAT>` next to the input, and `<input>.UNKNOWN` when
//! `--unknown` is given.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::process;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser as ClapParser;
use tracing::{error, info};

use oemcodec::{
    EncodeFormat, MessageData, MessageDatabase, MessageMetadata, Parser, ParserOptions, Status,
};

/// Convert OEM receiver logs between wire formats.
#[derive(ClapParser)]
#[command(name = "oemconvert")]
#[command(about = "Convert NovAtel OEM logs between wire formats", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Path to the JSON message-definition database
    database: String,

    /// Input file of interleaved OEM logs
    input: String,

    /// Target format
    #[arg(long, default_value = "ascii")]
    format: String,

    /// Additional message definitions to splice into the database
    #[arg(long)]
    append: Option<String>,

    /// Decompress RANGECMP logs into RANGE
    #[arg(long)]
    decompress_rangecmp: bool,

    /// Write unknown bytes to <input>.UNKNOWN
    #[arg(long)]
    unknown: bool,
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let encode_format: EncodeFormat = cli
        .format
        .parse()
        .map_err(|()| format!("unknown format '{}'; expected ascii, binary, flattened-binary or json", cli.format))?;

    info!(database = %cli.database, "loading message database");
    let start = Instant::now();
    let mut db = MessageDatabase::from_file(&cli.database)?;
    if let Some(append) = &cli.append {
        let extra = std::fs::read_to_string(append)?;
        db.append_messages(&extra)?;
    }
    info!(
        definitions = db.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "database ready"
    );

    let options = ParserOptions {
        decompress_rangecmp: cli.decompress_rangecmp,
        return_unknown_bytes: cli.unknown,
        encode_format,
        ..Default::default()
    };
    let mut parser = Parser::with_options(Arc::new(db), options)?;

    let mut reader = BufReader::new(File::open(&cli.input)?);
    let mut converted = File::create(format!("{}.{}", cli.input, encode_format))?;
    let mut unknown_out = if cli.unknown {
        Some(File::create(format!("{}.UNKNOWN", cli.input))?)
    } else {
        None
    };

    let mut message = MessageData::default();
    let mut metadata = MessageMetadata::default();
    let mut chunk = [0u8; 32768];
    let mut complete: u64 = 0;
    let start = Instant::now();

    loop {
        let read = reader.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        parser.write(&chunk[..read]);

        loop {
            match parser.read(&mut message, &mut metadata) {
                Status::Success => {
                    converted.write_all(message.message())?;
                    complete += 1;
                }
                Status::Unknown => {
                    if let Some(out) = unknown_out.as_mut() {
                        out.write_all(message.message())?;
                    }
                }
                Status::BufferEmpty => break,
                status => info!(status = %status, name = %metadata.message_name, "skipped"),
            }
        }
    }

    let mut trailing = Vec::new();
    parser.flush(Some(&mut trailing));
    if let Some(out) = unknown_out.as_mut() {
        out.write_all(&trailing)?;
    }

    info!(
        messages = complete,
        elapsed_ms = start.elapsed().as_millis() as u64,
        input = %cli.input,
        "conversion finished"
    );
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        error!(error = %e, "conversion failed");
        process::exit(1);
    }
}
