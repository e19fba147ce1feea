//! Request id and call sequence derivation.
//!
//! Both functions are pure: they only look at the caller's ambient values.

use uuid::Uuid;

/// Sequence of a call that starts a new chain.
pub const ROOT_SEQUENCE: &str = "1";

/// Reuse the ambient request id, or start a new request chain.
pub fn derive_request_id(ambient: Option<&str>) -> String {
    match ambient {
        Some(id) if !id.is_empty() => id.to_owned(),
        _ => Uuid::new_v4().to_string(),
    }
}

/// Sequence for a downstream call issued while handling `ambient`.
///
/// `"1.3"` becomes `"1.3.4"`: the chain so far, then the last segment plus one.
/// A missing ambient sequence, or one whose last segment is not a non-negative
/// integer, restarts at [`ROOT_SEQUENCE`].
pub fn derive_sequence(ambient: Option<&str>) -> String {
    let Some(sequence) = ambient else {
        return ROOT_SEQUENCE.to_owned();
    };
    let last = sequence.rsplit('.').next().unwrap_or(sequence);
    match last.parse::<u64>().ok().and_then(|n| n.checked_add(1)) {
        Some(next) => format!("{sequence}.{next}"),
        None => ROOT_SEQUENCE.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_from_root() {
        assert_eq!(derive_sequence(None), "1");
        assert_eq!(derive_sequence(Some("1")), "1.2");
        assert_eq!(derive_sequence(Some("5")), "5.6");
    }

    #[test]
    fn test_sequence_extends_chain() {
        assert_eq!(derive_sequence(Some("1.2")), "1.2.3");
        assert_eq!(derive_sequence(Some("1.2.9")), "1.2.9.10");
    }

    #[test]
    fn test_malformed_sequence_restarts() {
        assert_eq!(derive_sequence(Some("")), "1");
        assert_eq!(derive_sequence(Some("abc")), "1");
        assert_eq!(derive_sequence(Some("1.x")), "1");
        assert_eq!(derive_sequence(Some("1.-3")), "1");
        assert_eq!(derive_sequence(Some("1.")), "1");
        assert_eq!(derive_sequence(Some(&u64::MAX.to_string())), "1");
    }

    #[test]
    fn test_request_id_reused() {
        let id = derive_request_id(Some("req-42"));
        assert_eq!(id, "req-42");
        assert_eq!(derive_request_id(Some("req-42")), id);
    }

    #[test]
    fn test_request_id_generated() {
        let a = derive_request_id(None);
        let b = derive_request_id(Some(""));
        assert!(!a.is_empty());
        assert!(!b.is_empty());
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }
}
