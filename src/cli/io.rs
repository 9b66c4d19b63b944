//! CLI output helpers
//!
//! Commands print one JSON document to stdout; anything human-oriented
//! goes through the logger instead.

use serde_json::Value;

/// Print a command result as pretty JSON.
pub fn print_result(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => println!("{}", rendered),
        Err(_) => println!("{}", value),
    }
}
