// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Arkiva — PDF to PDF/A converter
//
// Entry point. Initialises logging, builds the pipeline from flags and
// environment, and converts one file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use arkiva_core::PdfaConfig;
use arkiva_pdfa::PdfaPipeline;

#[derive(Debug, Parser)]
#[command(name = "arkiva", about = "Convert a PDF into an archival PDF/A rendition")]
struct Args {
    /// Input PDF file.
    input: PathBuf,

    /// Output file. Defaults to the input path with a `.pdfa.pdf` suffix.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format: "pdfa" for PDF/A-2b, anything else for strict PDF/A-1b.
    #[arg(short, long, default_value = "pdfa")]
    format: String,

    /// External converter executable used to flatten deficient documents.
    #[arg(long, env = "ARKIVA_CONVERTER", default_value = "soffice")]
    tool: String,

    /// Seconds to wait for one external conversion before giving up.
    #[arg(long, default_value_t = 180)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(output) => {
            tracing::info!(output = %output.display(), "conversion complete");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(%err, "conversion failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> arkiva_core::Result<PathBuf> {
    let input = std::fs::read(&args.input)?;
    let output_path = args
        .output
        .unwrap_or_else(|| args.input.with_extension("pdfa.pdf"));

    let config = PdfaConfig {
        converter_tool: args.tool,
        convert_timeout_secs: args.timeout,
        ..PdfaConfig::default()
    };

    let pipeline = PdfaPipeline::new(config);
    let converted = pipeline.convert(&input, &args.format).await?;
    std::fs::write(&output_path, converted)?;
    Ok(output_path)
}
