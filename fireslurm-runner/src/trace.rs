//! Instruction trace post-processing
//!
//! Turns a human-readable `TRACEFILE*` dump into a per-address histogram.
//! Failures here never fail the run; they are logged and skipped.

use fireslurm_core::domain::log::{TRACE_BASE, TRACE_HISTOGRAM_FILE};
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Minimum hex digits for a token to count as an instruction address
const MIN_ADDRESS_DIGITS: usize = 8;

/// Trace files the simulator wrote into `log_dir`, sorted by name
pub fn find_trace_files(log_dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match std::fs::read_dir(log_dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(TRACE_BASE))
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}

/// Extracts the instruction address from one trace line
fn address_of(line: &str) -> Option<u64> {
    line.split(|c: char| c.is_whitespace() || c == ',' || c == ':')
        .map(|token| {
            token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token)
        })
        .find(|token| {
            token.len() >= MIN_ADDRESS_DIGITS
                && token.len() <= 16
                && token.bytes().all(|b| b.is_ascii_hexdigit())
        })
        .and_then(|token| u64::from_str_radix(token, 16).ok())
}

/// Counts instruction addresses across `files`
pub fn histogram(files: &[PathBuf]) -> io::Result<Vec<(u64, u64)>> {
    let mut counts: HashMap<u64, u64> = HashMap::new();
    for file in files {
        let reader = BufReader::new(std::fs::File::open(file)?);
        for line in reader.lines() {
            if let Some(address) = address_of(&line?) {
                *counts.entry(address).or_default() += 1;
            }
        }
    }

    let mut sorted: Vec<(u64, u64)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    Ok(sorted)
}

/// Writes the histogram for any traces in `log_dir`
///
/// Returns the histogram path, or `None` when there is no trace or it could
/// not be processed.
pub fn post_process(log_dir: &Path) -> Option<PathBuf> {
    let files = find_trace_files(log_dir);
    if files.is_empty() {
        return None;
    }

    let output = log_dir.join(TRACE_HISTOGRAM_FILE);
    let written = histogram(&files).and_then(|rows| {
        let mut out = io::BufWriter::new(std::fs::File::create(&output)?);
        writeln!(out, "address,count")?;
        for (address, count) in &rows {
            writeln!(out, "{:016x},{}", address, count)?;
        }
        out.flush()?;
        Ok(rows.len())
    });

    match written {
        Ok(rows) => {
            info!("Trace histogram ({} addresses) written to {}", rows, output.display());
            Some(output)
        }
        Err(e) => {
            warn!("Failed to post-process trace in {}: {}", log_dir.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_of_trace_lines() {
        assert_eq!(address_of("C0: 0000000000001234 ffffffff80000000 (0x00000013)"), Some(0x1234));
        assert_eq!(address_of("0xffffffff80000004,1"), Some(0xffffffff80000004));
        assert_eq!(address_of("cycle 12 retired"), None);
    }

    #[test]
    fn test_histogram_sorted_by_count_then_address() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("TRACEFILE0"),
            "0x80000010\n0x80000004\n0x80000010\n0x80000000\n",
        )
        .unwrap();

        let output = post_process(dir.path()).unwrap();
        let csv = std::fs::read_to_string(output).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "address,count",
                "0000000080000010,2",
                "0000000080000000,1",
                "0000000080000004,1",
            ]
        );
    }

    #[test]
    fn test_no_trace_no_histogram() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(post_process(dir.path()), None);
        assert!(!dir.path().join(TRACE_HISTOGRAM_FILE).exists());
    }
}
