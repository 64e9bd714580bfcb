//! Build script for spresense-port
//!
//! Validates port.toml at compile time so a broken config never reaches
//! the board (the runtime loader would only fall back to defaults).

use std::fs;
use std::path::Path;

#[path = "build/report.rs"]
mod report;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=build/report.rs");
    validate_config();
}

/// Validate port.toml configuration at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=port.toml");

    let config_path = Path::new("port.toml");
    let content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => fail("Failed to read port.toml", &[e.to_string()]),
    };

    let config: toml::Value = match toml::from_str(&content) {
        Ok(value) => value,
        Err(e) => fail(
            "Invalid TOML syntax in port.toml",
            &e.to_string().lines().map(str::to_string).collect::<Vec<_>>(),
        ),
    };

    let mut errors = Vec::new();
    check_strings(&config, "board", &["name", "mcu", "platform"], &mut errors);
    check_strings(&config, "repl", &["banner"], &mut errors);
    check_cwd(&config, &mut errors);
    check_hal(&config, &mut errors);

    if !errors.is_empty() {
        fail("Invalid port configuration", &errors);
    }
    println!("cargo:warning=port.toml validated successfully");
}

fn section<'a>(config: &'a toml::Value, name: &str, errors: &mut Vec<String>) -> Option<&'a toml::value::Table> {
    match config.get(name) {
        None => None,
        Some(toml::Value::Table(t)) => Some(t),
        Some(_) => {
            errors.push(format!("[{}] must be a table", name));
            None
        }
    }
}

/// Keys that, when present, must be non-empty strings
fn check_strings(config: &toml::Value, name: &str, keys: &[&str], errors: &mut Vec<String>) {
    let Some(table) = section(config, name, errors) else {
        return;
    };
    for key in keys {
        match table.get(*key) {
            None => {}
            Some(toml::Value::String(s)) if !s.is_empty() => {}
            Some(_) => errors.push(format!("[{}] {} must be a non-empty string", name, key)),
        }
    }
}

fn check_cwd(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(fs) = section(config, "fs", errors) else {
        return;
    };
    match fs.get("cwd") {
        None => {}
        Some(toml::Value::String(cwd)) if cwd.starts_with('/') => {}
        Some(_) => errors.push("[fs] cwd must be an absolute path".to_string()),
    }
}

fn check_hal(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(hal) = section(config, "hal", errors) else {
        return;
    };
    match hal.get("delay_slice_ms") {
        None => {}
        Some(toml::Value::Integer(ms)) if (1..=1000).contains(ms) => {}
        Some(_) => errors.push("[hal] delay_slice_ms must be 1-1000".to_string()),
    }
}

fn fail(title: &str, lines: &[String]) -> ! {
    let body = lines
        .iter()
        .map(|line| format!("║  • {:<62} ║", report::fit(line, 62)))
        .collect::<Vec<_>>()
        .join("\n");
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        report::fit(title, 56),
        body
    );
}
