use std::process::ExitCode;

use anyhow::{Context, Result};
use binstage::staging::guard;
use binstage::{ConvertRequest, ElementType, Shape, StagingConfig, WriteSummary};

fn usage(program: &str) -> String {
    format!(
        "Usage: {program} <input_binary_file> <output_parquet_file> [shape] [dtype]\n  \
         shape: Comma-separated dimensions (e.g., '1000,1000' for 1000x1000 matrix)\n  \
         dtype: Data type (default: float64)"
    )
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("binstage");
    if !(3..=5).contains(&args.len()) {
        eprintln!("{}", usage(program));
        return ExitCode::FAILURE;
    }

    match run(&args[1..]) {
        Ok(summary) => {
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::debug!("conversion failed: {e:?}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<WriteSummary> {
    // Parse everything before touching shared memory.
    let shape = Shape::parse_optional(args.get(2).map(String::as_str))?;
    let dtype = match args.get(3) {
        Some(name) => ElementType::from_name(name)?,
        None => ElementType::default(),
    };

    let mut request = ConvertRequest::new(&args[0], &args[1]).with_dtype(dtype);
    request.shape = shape;

    guard::install_interrupt_handler().context("installing interrupt handler")?;
    let config = StagingConfig::from_env();
    log::debug!("staging namespace: {}", config.namespace_dir.display());

    Ok(binstage::run(&request, &config)?)
}
