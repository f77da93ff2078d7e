//! rebases node names between zone origins and scopes them to domains

use crate::dns::zone::{qualify_name, strip_trailing_dot};

#[derive(Debug, Clone)]
pub enum RebaseError {
    /// The name could not be disambiguated between the two origins, which
    /// means the caller handed us semantically incompatible origins. This
    /// must never be resolved by guessing.
    InvalidNodeComparison {
        fqdn: String,
        source_origin: String,
        target_origin: String,
    },
}

impl std::fmt::Display for RebaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RebaseError::InvalidNodeComparison {
                fqdn,
                source_origin,
                target_origin,
            } => write!(
                f,
                "cannot rebase {} ({}) => ({})",
                fqdn, source_origin, target_origin
            ),
        }
    }
}

impl std::error::Error for RebaseError {}

type Result<T> = std::result::Result<T, RebaseError>;

/// Rewrites `name`, anchored at `source_origin`, into its equivalent
/// relative to `target_origin`.
///
/// The name is first fully qualified under the source origin (`@` is the
/// apex), then the target origin is removed as a whole-label suffix. An
/// empty remainder means the apex of the target zone. The remainder is
/// lower-cased; DNS names compare case-insensitively.
pub fn rebase_name(source_origin: &str, target_origin: &str, name: &str) -> Result<String> {
    let fqdn = qualify_name(name, source_origin);
    let fqdn = strip_trailing_dot(&fqdn).to_string();

    let target = strip_trailing_dot(target_origin);
    let remainder = if fqdn == target {
        ""
    } else if fqdn.ends_with(&format!(".{}", target)) {
        &fqdn[..fqdn.len() - target.len() - 1]
    } else {
        &fqdn[..]
    };

    // If the source origin still hangs off the remainder the two origins
    // loop into each other for this name, e.g. a name that already lives
    // under the target origin rebased back through the source origin.
    let source = strip_trailing_dot(source_origin);
    if remainder == source || remainder.ends_with(&format!(".{}", source)) {
        return Err(RebaseError::InvalidNodeComparison {
            fqdn,
            source_origin: source_origin.to_string(),
            target_origin: target_origin.to_string(),
        });
    }

    if remainder.is_empty() {
        Ok("@".to_string())
    } else {
        Ok(remainder.to_lowercase())
    }
}

/// Whether `node_name`, anchored at `origin`, falls under `domain`.
///
/// True when the fully qualified name equals the domain or sits anywhere
/// below it. Used both to scope a diff to one domain of an aggregated
/// target zone and to keep ignored sub-domains out of the diff entirely.
pub fn is_under_domain(domain: &str, node_name: &str, origin: &str) -> bool {
    let fqdn = qualify_name(node_name, origin);
    let fqdn = strip_trailing_dot(&fqdn);
    let domain = strip_trailing_dot(domain);

    fqdn == domain || fqdn.ends_with(&format!(".{}", domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebase_apex_of_source_zone() {
        assert_eq!(
            "activedirectory",
            rebase_name("activedirectory.example.org.", "example.org.", "@").unwrap()
        );
    }

    #[test]
    fn test_rebase_relative_node() {
        assert_eq!(
            "www.activedirectory",
            rebase_name("activedirectory.example.org.", "example.org.", "www").unwrap()
        );
    }

    #[test]
    fn test_rebase_absolute_name() {
        assert_eq!(
            "ldap.activedirectory",
            rebase_name(
                "activedirectory.example.org.",
                "example.org.",
                "ldap.activedirectory.example.org."
            )
            .unwrap()
        );
    }

    #[test]
    fn test_rebase_same_origin_is_identity() {
        assert_eq!(
            "www",
            rebase_name("example.org.", "example.org.", "www").unwrap()
        );
        assert_eq!("@", rebase_name("example.org.", "example.org.", "@").unwrap());
    }

    #[test]
    fn test_rebase_lowercases() {
        assert_eq!(
            "www.activedirectory",
            rebase_name("activedirectory.example.org.", "example.org.", "WWW").unwrap()
        );
    }

    #[test]
    fn test_rebase_partial_label_suffix_is_not_removed() {
        // "badexample.org" must not lose an "example.org" suffix.
        assert_eq!(
            "badexample.org",
            rebase_name("other.net.", "example.org.", "badexample.org.").unwrap()
        );
    }

    #[test]
    fn test_rebase_self_referential_name_fails() {
        // A name already under the target origin, pushed back through the
        // source origin, cannot be disambiguated.
        let result = rebase_name(
            "example.org.",
            "activedirectory.example.org.",
            "www.example.org.",
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_under_domain() {
        assert!(is_under_domain(
            "activedirectory.example.org",
            "www.activedirectory",
            "example.org."
        ));
        assert!(is_under_domain(
            "activedirectory.example.org",
            "activedirectory",
            "example.org."
        ));
        assert!(!is_under_domain(
            "activedirectory.example.org",
            "www",
            "example.org."
        ));
        // The apex is under its own domain.
        assert!(is_under_domain("example.org", "@", "example.org."));
        // Partial labels do not count.
        assert!(!is_under_domain(
            "ad.example.org",
            "bad.example.org.",
            "example.org."
        ));
    }
}
