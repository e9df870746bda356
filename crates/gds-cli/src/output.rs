//! Colored console output helpers.
//!
//! User-facing feedback lines, separate from the tracing diagnostics.

use colored::Colorize;

pub fn success(message: &str) {
    println!("{}", format!("\u{2713} {message}").green().bold());
}

pub fn info(message: &str) {
    println!("{}", message.blue());
}

pub fn warn(message: &str) {
    eprintln!("{}", format!("\u{26a0} {message}").yellow());
}

pub fn error(message: &str) {
    eprintln!("{}", format!("\u{2717} {message}").red().bold());
}
