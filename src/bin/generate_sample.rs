use std::fs::File;
use std::io::{BufWriter, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// splitmix64; deterministic so generated fixtures are reproducible.
struct SampleRng(u64);

impl SampleRng {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller
    fn gauss(&mut self, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        std_dev * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

fn parse_dim(arg: Option<&String>, default: usize, what: &str) -> Result<usize> {
    match arg {
        None => Ok(default),
        Some(s) => s
            .parse::<usize>()
            .ok()
            .filter(|&n| n > 0)
            .with_context(|| format!("{what} must be a positive integer, got '{s}'")),
    }
}

/// Size of a `rows` x `cols` float64 file, or `None` if it overflows.
fn byte_len(rows: usize, cols: usize) -> Option<usize> {
    rows.checked_mul(cols)?.checked_mul(std::mem::size_of::<f64>())
}

/// Writes `rows` synthetic spectra of `cols` points each as raw native-endian
/// float64 values, row after row.
fn generate(path: &str, rows: usize, cols: usize) -> Result<()> {
    let mut rng = SampleRng(42);
    let mut out = BufWriter::new(File::create(path).with_context(|| format!("creating {path}"))?);

    for row in 0..rows {
        let scale = 1.0 + (row % 5) as f64 * 0.5;
        let peaks = [(0.25, 0.05, 0.8 * scale), (0.6, 0.03, 0.5), (0.85, 0.04, 0.3 * scale)];
        for col in 0..cols {
            let x = col as f64 / cols as f64;
            let signal: f64 = peaks
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(x, mu, sigma, amp))
                .sum();
            let value = signal + rng.gauss(0.005 * scale);
            out.write_all(&value.to_ne_bytes())?;
        }
    }
    out.flush().context("flushing sample file")?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("Usage: generate_sample <output.bin> [rows] [cols]");
        return ExitCode::FAILURE;
    };

    let result = parse_dim(args.get(2), 30, "rows")
        .and_then(|rows| Ok((rows, parse_dim(args.get(3), 1000, "cols")?)))
        .and_then(|(rows, cols)| {
            let bytes = byte_len(rows, cols)
                .with_context(|| format!("{rows} x {cols} float64 values do not fit in memory"))?;
            generate(path, rows, cols).map(|()| (rows, cols, bytes))
        });

    match result {
        Ok((rows, cols, bytes)) => {
            log::info!("wrote {bytes} bytes");
            println!("Wrote {rows} x {cols} float64 values to {path} (shape argument: {rows},{cols})");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
