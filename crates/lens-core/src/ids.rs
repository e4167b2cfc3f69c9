//! ID prefix constants.
//!
//! IDs are generated by the database layer as `{prefix}-{8 hex chars}`,
//! e.g. `sit-a3f8b2c1`.

pub const PREFIX_SITE: &str = "sit";
pub const PREFIX_AUDIT_REQUEST: &str = "aud";
pub const PREFIX_REPORT: &str = "rpt";

pub const ALL_PREFIXES: &[&str] = &[PREFIX_SITE, PREFIX_AUDIT_REQUEST, PREFIX_REPORT];

/// Check whether `id` has the given prefix followed by a dash and a
/// non-empty hex suffix.
#[must_use]
pub fn has_prefix(id: &str, prefix: &str) -> bool {
    id.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|hex| !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for prefix in ALL_PREFIXES {
            assert!(seen.insert(*prefix), "duplicate prefix {prefix}");
        }
    }

    #[test]
    fn has_prefix_checks_shape() {
        assert!(has_prefix("sit-a3f8b2c1", PREFIX_SITE));
        assert!(!has_prefix("sit-", PREFIX_SITE));
        assert!(!has_prefix("sit-zzzz", PREFIX_SITE));
        assert!(!has_prefix("aud-a3f8b2c1", PREFIX_SITE));
        assert!(!has_prefix("sita3f8b2c1", PREFIX_SITE));
    }
}
