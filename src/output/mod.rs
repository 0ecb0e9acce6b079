//! Styled terminal output for helm-vault.
//!
//! Status lines go to stdout, errors to stderr. Document text printed by
//! `view` is written unstyled so it can be piped.

use owo_colors::OwoColorize;

const GREEN: (u8, u8, u8) = (152, 225, 152);
const RED: (u8, u8, u8) = (255, 160, 160);
const YELLOW: (u8, u8, u8) = (255, 230, 160);
const BLUE: (u8, u8, u8) = (160, 200, 255);
const LAVENDER: (u8, u8, u8) = (181, 174, 254);
const GREY: (u8, u8, u8) = (160, 160, 160);

fn status_line(symbol: &str, (r, g, b): (u8, u8, u8), message: &str) -> String {
    format!("{} {}", symbol.truecolor(r, g, b).bold(), message.bright_white())
}

pub fn success(message: &str) {
    println!("{}", status_line("✓", GREEN, message));
}

pub fn error(message: &str) {
    eprintln!("{}", status_line("✗", RED, message));
}

pub fn warning(message: &str) {
    println!("{}", status_line("⚠", YELLOW, message));
}

pub fn info(message: &str) {
    println!("{}", status_line("ℹ", BLUE, message));
}

/// Header followed by a rule
pub fn section(title: &str) {
    let (r, g, b) = LAVENDER;
    println!("\n{}", title.truecolor(r, g, b).bold());
    let (r, g, b) = GREY;
    println!("{}", "─".repeat(50).truecolor(r, g, b));
}

/// Indented `key: value` line, e.g. a document location and its placeholder
pub fn key_value(key: &str, value: &str) {
    let (r, g, b) = GREY;
    println!(
        "  {} {}",
        format!("{}:", key).truecolor(r, g, b),
        value.bright_white()
    );
}

/// Verbose diagnostics
pub fn dimmed(message: &str) {
    let (r, g, b) = GREY;
    println!("{}", message.truecolor(r, g, b));
}

/// Print text exactly as given
pub fn plain(text: &str) {
    print!("{}", text);
}
