// src/utils.rs
use log::warn;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Reads lines from a file into a vector of strings.
///
/// Lines that are not valid UTF-8 are skipped with a warning; only failing
/// to open or read the file is an error.
pub fn read_lines(path: &Path) -> io::Result<Vec<String>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut lines = Vec::new();
    for (index, raw) in reader.split(b'\n').enumerate() {
        let mut raw = raw?;
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
        match String::from_utf8(raw) {
            Ok(line) => lines.push(line),
            Err(_) => warn!("{}:{}: skipping line that is not valid UTF-8", path.display(), index + 1),
        }
    }
    Ok(lines)
}

/// Check if a string is a valid domain
pub fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }

    let parts: Vec<&str> = domain.split('.').collect();
    if parts.len() < 2 {
        return false;
    }

    for part in parts {
        if part.is_empty() || part.len() > 63 {
            return false;
        }

        if !part.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
            return false;
        }

        if part.starts_with('-') || part.ends_with('-') {
            return false;
        }
    }

    true
}

/// Lower-case a DNS name and strip trailing dots.
pub fn normalize_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_lowercase()
}

/// Build `<label>.<domain>` from a wordlist line. Blank lines yield `None`.
pub fn qualify(label: &str, domain: &str) -> Option<String> {
    let label = label.trim().trim_end_matches('.');
    if label.is_empty() {
        return None;
    }
    Some(format!("{}.{}", label.to_lowercase(), domain))
}

/// The CNAME target of `name` if it points somewhere else, `None` when the
/// lookup answered with the name itself.
pub fn distinct_target(name: &str, cname: &str) -> Option<String> {
    let target = normalize_name(cname);
    if target.is_empty() || target == normalize_name(name) {
        None
    } else {
        Some(target)
    }
}
