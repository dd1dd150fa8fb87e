// src/remediation/mod.rs
// Hybrid remediation matcher: normalization, signature derivation, and scoring live
// in their own submodules; this file only re-exports and wires the normalization passes a
// caller needs before storing or matching an error.

pub mod matcher;
pub mod service;

use std::sync::LazyLock;

use contextd_types::ErrorSignature;
use regex::Regex;
use sha2::{Digest, Sha256};

pub use matcher::{hybrid_score, levenshtein_similarity};
pub use service::RemediationService;

#[allow(clippy::expect_used)]
static LINE_NUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":\d+(:\d+)?").expect("valid regex"));
#[allow(clippy::expect_used)]
static MEM_ADDR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"0x[0-9a-fA-F]{4,}").expect("valid regex"));
#[allow(clippy::expect_used)]
static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:?\d{2})?").expect("valid regex")
});
#[allow(clippy::expect_used)]
static UUID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}").expect("valid regex")
});
#[allow(clippy::expect_used)]
static PID_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bpid\s+\d+\b").expect("valid regex"));
#[allow(clippy::expect_used)]
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
#[allow(clippy::expect_used)]
static ABS_PATH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(/[\w.\-]+)+/([\w.\-]+)").expect("valid regex"));

/// Normalizes an error message into a form stable across runs: line numbers, memory
/// addresses, timestamps, absolute paths, UUIDs, and PIDs are replaced with placeholders so
/// two occurrences of "the same" error compare equal even when those incidental details
/// differ. Passes run in a fixed order so later passes never re-match earlier
/// placeholders.
pub fn normalize_error(raw: &str) -> String {
    let mut s = raw.to_string();
    s = LINE_NUM.replace_all(&s, ":LINE_NUM").into_owned();
    s = MEM_ADDR.replace_all(&s, "MEM_ADDR").into_owned();
    s = TIMESTAMP.replace_all(&s, "TIMESTAMP").into_owned();
    s = ABS_PATH
        .replace_all(&s, |caps: &regex::Captures| {
            std::path::Path::new(&caps[0])
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned();
    s = UUID_PATTERN.replace_all(&s, "UUID").into_owned();
    s = PID_PATTERN.replace_all(&s, "PID").into_owned();
    s = WHITESPACE.replace_all(&s, " ").into_owned();
    s.trim().to_string()
}

/// Extracts a coarse "error type" token from a message, e.g. `ConnectionRefused`,
/// `NullPointerException`, `TypeError` — the first CamelCase or SCREAMING_SNAKE identifier
/// followed by a colon, or the caller-supplied type if normalization finds nothing.
/// Always lowercased, since this value is compared fuzzily (never displayed), and empty
/// when nothing can be inferred — callers decide what an absent type means, not this
/// function.
pub fn infer_error_type(error_message: &str, declared_type: &str) -> String {
    if !declared_type.trim().is_empty() {
        return declared_type.trim().to_lowercase();
    }
    #[allow(clippy::expect_used)]
    static TYPE_TOKEN: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9_]*(?:Error|Exception|Fault))\b").expect("valid regex"));
    TYPE_TOKEN
        .captures(error_message.trim())
        .map(|c| c[1].to_lowercase())
        .unwrap_or_default()
}

/// Derives `function_lower|file_basename_lower` tokens from a stack trace, one per frame,
/// joined by `|`, used for the stack-overlap boost in matcher::hybrid_score.
pub fn stack_signature(stack_trace: &str) -> String {
    #[allow(clippy::expect_used)]
    static FRAME: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^\s*(?:at\s+)?([\w:.$<>]+)\s*\(([^:()]+)").expect("valid regex"));
    FRAME
        .captures_iter(stack_trace)
        .map(|c| {
            let func = c[1].to_lowercase();
            let file = std::path::Path::new(&c[2])
                .file_name()
                .map(|f| f.to_string_lossy().to_lowercase())
                .unwrap_or_else(|| c[2].to_lowercase());
            format!("{func}|{file}")
        })
        .collect::<Vec<_>>()
        .join("|")
}

pub fn derive_signature(error_message: &str, declared_type: &str, stack_trace: Option<&str>) -> ErrorSignature {
    let normalized_error = normalize_error(error_message);
    let error_type = infer_error_type(error_message, declared_type);
    let stack_signature = stack_trace.map(stack_signature).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(normalized_error.as_bytes());
    hasher.update(b"|");
    hasher.update(error_type.as_bytes());
    hasher.update(b"|");
    hasher.update(stack_signature.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    ErrorSignature {
        normalized_error,
        error_type,
        stack_signature,
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_replaces_line_numbers() {
        let out = normalize_error("panic at src/main.rs:42:17");
        assert!(out.contains(":LINE_NUM"));
        assert!(!out.contains("42"));
    }

    #[test]
    fn normalize_replaces_memory_addresses() {
        let out = normalize_error("segfault at address 0x7ffeedc12340");
        assert!(out.contains("MEM_ADDR"));
    }

    #[test]
    fn normalize_replaces_absolute_paths_with_basename() {
        let out = normalize_error("failed to open /home/alice/project/src/lib.rs");
        assert!(out.contains("lib.rs"));
        assert!(!out.contains("/home/alice"));
    }

    #[test]
    fn normalize_replaces_uuid() {
        let out = normalize_error("request 550e8400-e29b-41d4-a716-446655440000 failed");
        assert!(out.contains("UUID"));
    }

    #[test]
    fn normalize_replaces_pid() {
        let out = normalize_error("process PID 12345 crashed");
        assert!(out.to_uppercase().contains("PID"));
        assert!(!out.contains("12345"));
    }

    #[test]
    fn normalize_collapses_whitespace() {
        let out = normalize_error("too   many     spaces");
        assert_eq!(out, "too many spaces");
    }

    #[test]
    fn same_error_with_different_incidentals_normalizes_equal() {
        let a = normalize_error("connection refused at /tmp/a/db.sock:99 pid 111");
        let b = normalize_error("connection refused at /tmp/b/db.sock:12 pid 222");
        assert_eq!(a, b);
    }

    #[test]
    fn derive_signature_is_deterministic() {
        let a = derive_signature("NullPointerException: x is null", "", None);
        let b = derive_signature("NullPointerException: x is null", "", None);
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn infer_error_type_prefers_declared_type_lowercased() {
        assert_eq!(infer_error_type("whatever", "CustomError"), "customerror");
    }

    #[test]
    fn infer_error_type_falls_back_to_empty_when_nothing_inferred() {
        assert_eq!(infer_error_type("something went wrong", ""), "");
    }

    #[test]
    fn infer_error_type_extracts_token_from_message_lowercased() {
        assert_eq!(infer_error_type("ModuleNotFoundError: no module named 'django'", ""), "modulenotfounderror");
    }
}
