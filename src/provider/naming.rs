//! Node name generation
//!
//! Names are `<prefix>-<uuid>` with a random v4 UUID in its 32-character
//! hex form. Concurrent creates need no coordination; a collision is still
//! detected by the runtime and answered with a fresh name.

use uuid::Uuid;

use crate::{Error, Result};

/// Longest name Kubernetes accepts for a DNS label
const MAX_NAME_LEN: usize = 63;

/// Characters k3d adds around the name (`k3d-` and `-0`)
const K3D_DECORATION_LEN: usize = 6;

/// Length of the random token plus its separator
const TOKEN_LEN: usize = 33;

/// Longest prefix that still leaves room for the whole token
pub const MAX_PREFIX_LEN: usize = MAX_NAME_LEN - K3D_DECORATION_LEN - TOKEN_LEN;

/// Generates node names
#[derive(Clone, Debug)]
pub struct NodeNamer {
    prefix: String,
}

impl NodeNamer {
    /// Create a namer using the given prefix
    ///
    /// The prefix must be a lowercase DNS label of at most
    /// [`MAX_PREFIX_LEN`] characters, so the random token is never cut.
    pub fn new(prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        Ok(Self { prefix })
    }

    /// A new name, distinct from every previous one with overwhelming probability
    pub fn generate(&self) -> String {
        format!("{}-{}", self.prefix, Uuid::new_v4().simple())
    }
}

fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() || prefix.len() > MAX_PREFIX_LEN {
        return Err(Error::validation(format!(
            "node name prefix {:?} must be 1 to {} characters",
            prefix, MAX_PREFIX_LEN
        )));
    }
    let allowed = prefix
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !allowed || prefix.starts_with('-') {
        return Err(Error::validation(format!(
            "node name prefix {:?} must be lowercase alphanumerics or '-' and start with one",
            prefix
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn names_carry_the_prefix() {
        let name = NodeNamer::new("node").unwrap().generate();
        assert!(name.starts_with("node-"));
        assert_eq!(name.len(), "node-".len() + 32);
    }

    #[test]
    fn names_are_lowercase_dns_labels() {
        let name = NodeNamer::new("node").unwrap().generate();
        assert!(name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        assert!(!name.ends_with('-'));
    }

    #[test]
    fn many_names_never_repeat() {
        let namer = NodeNamer::new("node").unwrap();
        let names: HashSet<_> = (0..10_000).map(|_| namer.generate()).collect();
        assert_eq!(names.len(), 10_000);
    }

    #[test]
    fn longest_prefix_keeps_the_whole_token_and_fits_k3d_naming() {
        let namer = NodeNamer::new("a".repeat(MAX_PREFIX_LEN)).unwrap();
        let first = namer.generate();
        let second = namer.generate();

        assert_ne!(first, second);
        assert_eq!(first.len(), MAX_PREFIX_LEN + 33);
        assert_eq!(format!("k3d-{}-0", first).len(), 63);
    }

    #[test]
    fn overlong_prefixes_are_rejected() {
        let err = NodeNamer::new("n".repeat(56)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(NodeNamer::new("a".repeat(MAX_PREFIX_LEN + 1)).is_err());
    }

    #[test]
    fn prefixes_outside_dns_label_charset_are_rejected() {
        assert!(NodeNamer::new("").is_err());
        assert!(NodeNamer::new("Node").is_err());
        assert!(NodeNamer::new("node_pool").is_err());
        assert!(NodeNamer::new("-node").is_err());
        assert!(NodeNamer::new("pool-a").is_ok());
    }
}
