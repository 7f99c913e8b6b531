//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `mindweave_core` linkage and
//!   schema bootstrap.
//! - Keep output deterministic for quick local sanity checks.

use std::process::ExitCode;

fn main() -> ExitCode {
    // Fixed output lines; scripts grep these.
    println!("mindweave_core ping={}", mindweave_core::ping());
    println!("mindweave_core version={}", mindweave_core::core_version());

    match mindweave_core::db::open_db_in_memory() {
        Ok(_) => {
            println!(
                "mindweave_core schema_version={}",
                mindweave_core::db::migrations::latest_version()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("mindweave_core schema_error={err}");
            ExitCode::FAILURE
        }
    }
}
