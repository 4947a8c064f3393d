//! Lexical address handling: shape check and local/domain split.
//!
//! The shape check is deliberately coarse. Anything that survives it is
//! handed to DNS and SMTP, which are the real arbiters of deliverability.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// `<no-space-no-@>+ @ <no-space-no-@>+ . <no-space-no-@>+`
static ADDRESS_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("address shape regex"));

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("address does not match the expected shape")]
    Shape,
    #[error("domain IDNA conversion failed")]
    Idna {
        #[source]
        source: idna::Errors,
    },
}

/// An address that passed the shape check, split on its last `@`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub original: String,
    pub local: String,
    pub domain: String,
    /// IDNA (punycode) form of `domain`, lowercased; what DNS and SMTP use.
    pub ascii_domain: String,
}

impl Address {
    /// Parse `input` into local-part and domain.
    ///
    /// The split is on the last `@`, so a quoted local-part containing `@`
    /// would fail the shape check first rather than mis-split.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let trimmed = input.trim();
        if !ADDRESS_SHAPE.is_match(trimmed) {
            return Err(AddressError::Shape);
        }
        let Some(at) = trimmed.rfind('@') else {
            return Err(AddressError::Shape);
        };
        let (local, domain) = (&trimmed[..at], &trimmed[at + 1..]);
        let ascii_domain = idna::domain_to_ascii(domain)
            .map_err(|source| AddressError::Idna { source })?
            .to_ascii_lowercase();
        Ok(Self {
            original: input.to_string(),
            local: local.to_string(),
            domain: domain.to_string(),
            ascii_domain,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_basic() {
        let addr = Address::parse("alice@example.com").unwrap();
        assert_eq!(addr.local, "alice");
        assert_eq!(addr.domain, "example.com");
        assert_eq!(addr.ascii_domain, "example.com");
    }

    #[test]
    fn rejects_missing_at() {
        assert!(matches!(
            Address::parse("notanemail"),
            Err(AddressError::Shape)
        ));
    }

    #[test]
    fn rejects_missing_tld_dot() {
        assert!(matches!(Address::parse("a@b"), Err(AddressError::Shape)));
    }

    #[test]
    fn rejects_spaces() {
        assert!(matches!(
            Address::parse("a b@example.com"),
            Err(AddressError::Shape)
        ));
    }

    #[test]
    fn rejects_double_at() {
        assert!(matches!(
            Address::parse("a@@example.com"),
            Err(AddressError::Shape)
        ));
    }

    #[test]
    fn idna_lowercases_domain() {
        let addr = Address::parse("bob@EXAMPLE.com").unwrap();
        assert_eq!(addr.ascii_domain, "example.com");
        assert_eq!(addr.domain, "EXAMPLE.com");
    }

    #[test]
    fn unicode_domain_converts_to_punycode() {
        let addr = Address::parse("bob@bücher.example").unwrap();
        assert_eq!(addr.ascii_domain, "xn--bcher-kva.example");
    }

}
