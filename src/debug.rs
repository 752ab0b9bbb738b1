//! Dev-only diagnostics for classification decisions.
//!
//! Titles are never logged raw: only a short SHA-256 prefix.

use tracing::debug;

// Dev logging gate: DIGEST_DEV_LOG=1 AND a debug build.
pub(crate) fn dev_logging_enabled() -> bool {
    cfg!(debug_assertions) && std::env::var("DIGEST_DEV_LOG").ok().as_deref() == Some("1")
}

pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Log one classification outcome; `group` is `None` for rejected titles.
pub(crate) fn dev_log_classified(source: &str, title: &str, group: Option<&str>) {
    if !dev_logging_enabled() {
        return;
    }
    let id = anon_hash(title);
    match group {
        Some(g) => debug!(target: "digest", %id, source, group = g, "title matched"),
        None => debug!(target: "digest", %id, source, "title rejected"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anon_hash_is_short_and_stable() {
        let a = anon_hash("AI芯片突破");
        assert_eq!(a.len(), 12);
        assert_eq!(a, anon_hash("AI芯片突破"));
        assert_ne!(a, anon_hash("AI芯片突破!"));
    }
}
