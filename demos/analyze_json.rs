//! Analyze one recording and print the result as JSON
//!
//! ```text
//! cargo run --example analyze_json -- recording.wav [config.json]
//! ```
//!
//! Files without a `.wav` extension are read as raw little-endian 16-bit PCM
//! at 44.1 kHz. Set `RUST_LOG=formant_analyzer=debug` to see the pipeline.

use std::process::ExitCode;

use formant_analyzer::{AnalysisConfig, Analyzer, SampleBuffer};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(recording) = args.next() else {
        eprintln!("usage: analyze_json <recording> [config.json]");
        return ExitCode::FAILURE;
    };

    match run(&recording, args.next().as_deref()) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(recording: &str, config: Option<&str>) -> formant_analyzer::Result<String> {
    let config = match config {
        Some(path) => AnalysisConfig::from_json_file(path)?,
        None => AnalysisConfig::default(),
    };
    let buffer = SampleBuffer::from_file(recording)?;
    let report = Analyzer::new(config)?.run(&buffer);

    let formants = match report.formants() {
        Ok(list) => json!(list.formants()),
        Err(e) => json!({ "error": e.to_string() }),
    };
    let response = match report.response() {
        Ok(curve) => json!({
            "peak_hz": curve.peak_frequency(),
            "points": curve.points(),
        }),
        Err(e) => json!({ "error": e.to_string() }),
    };

    let output = json!({
        "file": recording,
        "sample_rate": buffer.sample_rate(),
        "duration": buffer.duration(),
        "strong_range": report.strong_range(),
        "vowel_range": report.vowel_range(),
        "formants": formants,
        "response": response,
        "waveform": report.waveform(),
    });

    Ok(serde_json::to_string_pretty(&output)?)
}
