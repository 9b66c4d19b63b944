//! atlas CLI entry point
//!
//! main.rs parses arguments, dispatches to CLI commands, and never
//! calls subsystems directly.

use std::process;

use atlas::cli::{run_command, Cli};

fn main() {
    let cli = Cli::parse_args();

    if let Err(e) = run_command(cli) {
        let error_json = serde_json::json!({
            "status": "error",
            "code": e.code_str(),
            "message": e.message(),
        });
        eprintln!("{}", error_json);
        process::exit(1);
    }
}
