// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test data generators for attack simulation.

use serde_json::{json, Value};
use std::net::{IpAddr, Ipv4Addr};

/// Generate a pool of IP addresses for testing.
pub fn generate_ips(count: usize) -> Vec<IpAddr> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c))
        })
        .collect()
}

/// Generate a pool of claimed user identities.
pub fn generate_user_ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("user-{:05}", i)).collect()
}

/// Build a request body, optionally claiming an identity.
pub fn security_body(user_id: Option<&str>, input: &str) -> Value {
    match user_id {
        Some(id) => json!({"userId": id, "input": input, "category": "comment"}),
        None => json!({"input": input, "category": "comment"}),
    }
}

/// Script payloads an attacker might submit.
pub fn generate_payloads() -> Vec<(&'static str, &'static str)> {
    vec![
        ("hello", "hello"),
        ("<script>alert(1)</script>", ""),
        ("a<SCRIPT>steal()</SCRIPT>b", "ab"),
        ("<script src=//evil.example></script>x", "x"),
        ("<ScRiPt>1</sCrIpT><script>2</script>", ""),
        ("keep <b>bold</b>", "keep <b>bold</b>"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ips() {
        let ips = generate_ips(256);
        assert_eq!(ips.len(), 256);
        // All should be unique
        let unique: std::collections::HashSet<_> = ips.iter().collect();
        assert_eq!(unique.len(), 256);
    }

    #[test]
    fn test_generate_user_ids() {
        let ids = generate_user_ids(100);
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 100);
    }
}
