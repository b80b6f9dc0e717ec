//! Lexical splitting of container image references.
//!
//! Recovers the registry domain from an image reference the same way the
//! container runtimes do: the first path segment is a domain only when it
//! looks like a host. No registry lookups are performed.

/// The public registry assumed when a reference carries no domain.
pub const DEFAULT_DOMAIN: &str = "docker.io";

/// Older references spell the public registry as `index.docker.io`.
const LEGACY_DEFAULT_DOMAIN: &str = "index.docker.io";

/// Implicit namespace for single-segment repositories on the public registry.
const OFFICIAL_REPO_PREFIX: &str = "library";

/// Split an image reference into `(domain, remainder)`.
///
/// The segment before the first `/` is treated as a registry domain only if
/// it contains a `.` or a `:` (port separator) or equals `localhost`;
/// otherwise the whole reference is a repository path on the default public
/// registry. Single-segment repositories on the public registry get the
/// implicit `library/` namespace, so
/// `split_domain("docker.io/nginx:latest")` yields
/// `("docker.io", "library/nginx:latest")`.
///
/// This never fails: malformed input produces a best-effort split.
pub fn split_domain(reference: &str) -> (String, String) {
    let (mut domain, mut remainder) = match reference.split_once('/') {
        Some((head, tail)) if looks_like_domain(head) => (head.to_string(), tail.to_string()),
        _ => (DEFAULT_DOMAIN.to_string(), reference.to_string()),
    };

    if domain == LEGACY_DEFAULT_DOMAIN {
        domain = DEFAULT_DOMAIN.to_string();
    }

    if domain == DEFAULT_DOMAIN && !remainder.is_empty() && !remainder.contains('/') {
        remainder = format!("{OFFICIAL_REPO_PREFIX}/{remainder}");
    }

    (domain, remainder)
}

fn looks_like_domain(head: &str) -> bool {
    head.contains('.') || head.contains(':') || head == "localhost"
}
