//! Verify command implementation.

use super::{CliError, CliResult};
use place_storage::{verify_log, LOG_FILE};
use std::path::Path;

/// Runs the verify command.
pub fn run(data_dir: &Path) -> CliResult<()> {
    let log_path = data_dir.join(LOG_FILE);
    println!("Verifying placement log at {}", log_path.display());
    println!();

    if !log_path.exists() {
        println!("Log file not found (this may be normal for a new canvas)");
        return Ok(());
    }

    let report = verify_log(&log_path)?;
    println!("  Records:     {}", report.records);
    println!("  Valid bytes: {}", report.valid_bytes);
    println!("  File bytes:  {}", report.total_bytes);
    if let Some(error) = &report.first_error {
        println!("  First error: {error}");
    }

    println!();
    if report.is_clean() {
        println!("✓ Placement log verification passed");
        Ok(())
    } else {
        println!(
            "✗ Placement log verification failed ({} trailing bytes would be truncated on open)",
            report.total_bytes - report.valid_bytes
        );
        Err(CliError::VerificationFailed)
    }
}
