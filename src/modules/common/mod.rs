// Copyright © 2025 mailvault.dev
// Licensed under MailVault License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Eq, Hash, Clone, Serialize, Deserialize)]
pub struct Addr {
    /// The optional display name associated with the email address (e.g., "John Doe").
    /// If `None`, no display name is specified.
    pub name: Option<String>,
    /// The optional email address (e.g., "john.doe@example.com").
    /// If `None`, the address is unavailable, though typically at least one of `name` or `address` is provided.
    pub address: Option<String>,
}

impl Addr {
    pub fn new(name: Option<&str>, address: Option<&str>) -> Self {
        Addr {
            name: name.map(Into::into),
            address: address.map(Into::into),
        }
    }

    pub fn parse(s: &str) -> Self {
        let re = Regex::new(r#"(?:(?P<name>.*)\s*)?<(?P<email>[^<>]+)>"#).unwrap();
        if let Some(caps) = re.captures(s) {
            let name: Option<String> = caps.name("name").map(|m| m.as_str().trim().into());
            let email: Option<String> = caps.name("email").map(|m| m.as_str().trim().into());
            Addr {
                name: name.filter(|n| !n.is_empty()),
                address: email,
            }
        } else {
            Addr {
                name: None,
                address: Some(s.trim().into()),
            }
        }
    }

    /// Case-insensitive match against a bare email address.
    pub fn matches_address(&self, address: &str) -> bool {
        self.address
            .as_deref()
            .is_some_and(|a| a.eq_ignore_ascii_case(address))
    }
}

/// Removes duplicate recipients while preserving first-seen order.
pub fn dedup_addrs(addrs: Vec<Addr>) -> Vec<Addr> {
    let mut seen = ahash::AHashSet::new();
    addrs
        .into_iter()
        .filter(|addr| seen.insert(addr.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_and_address() {
        let addr = Addr::parse("John Doe <john.doe@example.com>");
        assert_eq!(addr.name.as_deref(), Some("John Doe"));
        assert_eq!(addr.address.as_deref(), Some("john.doe@example.com"));
    }

    #[test]
    fn parses_bare_address() {
        let addr = Addr::parse("jane@example.com");
        assert_eq!(addr.name, None);
        assert_eq!(addr.address.as_deref(), Some("jane@example.com"));
    }

    #[test]
    fn dedup_preserves_first_seen_order() {
        let a = Addr::new(Some("A"), Some("a@x.org"));
        let b = Addr::new(None, Some("b@x.org"));
        let deduped = dedup_addrs(vec![a.clone(), b.clone(), a.clone()]);
        assert_eq!(deduped, vec![a, b]);
    }
}
