//! Architecture guard tests for puya-bridge-core.
//!
//! These scan source files to keep conventions from drifting:
//! - Error types derive thiserror, no hand-written Display
//! - No `.unwrap()` / `.expect(` outside test modules
//! - The registry is the only owner of client sessions
//!
//! Run: `cargo test --package puya-bridge-core --test architecture_guards -- --nocapture`

use std::fs;
use std::path::{Path, PathBuf};

/// Simple recursive directory walk
fn walkdir(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(walkdir(&path));
            } else if path.extension().is_some_and(|e| e == "rs") {
                files.push(path);
            }
        }
    }
    files
}

fn src_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src")
}

/// File contents up to its `#[cfg(test)]` module
fn production_part(content: &str) -> &str {
    match content.find("#[cfg(test)]") {
        Some(pos) => &content[..pos],
        None => content,
    }
}

fn rel(path: &Path) -> String {
    path.strip_prefix(src_dir())
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

fn report(rule: &str, advice: &str, violations: &[(String, usize, String)]) {
    if violations.is_empty() {
        return;
    }
    let mut msg = format!("\n[{}] {}\n\n", rule, advice);
    for (file, line, text) in violations {
        msg.push_str(&format!("  {}:{} -> {}\n", file, line, text));
    }
    panic!("{msg}");
}

#[test]
fn test_error_types_use_thiserror() {
    let mut violations = Vec::new();
    for file in walkdir(&src_dir()) {
        let Ok(content) = fs::read_to_string(&file) else {
            continue;
        };
        for (i, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.starts_with("impl")
                && trimmed.contains("Display for")
                && trimmed.contains("Error")
            {
                violations.push((rel(&file), i + 1, trimmed.to_string()));
            }
        }
    }
    report(
        "ERR-01",
        "Hand-written Display for an error type. Derive thiserror::Error instead.",
        &violations,
    );
}

#[test]
fn test_no_unwrap_outside_tests() {
    let mut violations = Vec::new();
    for file in walkdir(&src_dir()) {
        let Ok(content) = fs::read_to_string(&file) else {
            continue;
        };
        for (i, line) in production_part(&content).lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.starts_with("//") {
                continue;
            }
            if trimmed.contains(".unwrap()") || trimmed.contains(".expect(") {
                violations.push((rel(&file), i + 1, trimmed.to_string()));
            }
        }
    }
    report(
        "ERR-02",
        "unwrap/expect in library code. Propagate a BridgeError instead.",
        &violations,
    );
}

#[test]
fn test_sessions_owned_by_registry() {
    let mut violations = Vec::new();
    for file in walkdir(&src_dir()) {
        let relative = rel(&file);
        if relative.starts_with("session") || relative == "registry.rs" {
            continue;
        }
        let Ok(content) = fs::read_to_string(&file) else {
            continue;
        };
        for (i, line) in production_part(&content).lines().enumerate() {
            if line.contains("ClientSession") && !line.trim().starts_with("//") {
                violations.push((relative.clone(), i + 1, line.trim().to_string()));
            }
        }
    }
    report(
        "SES-01",
        "ClientSession referenced outside the registry. Go through SessionRegistry.",
        &violations,
    );
}
