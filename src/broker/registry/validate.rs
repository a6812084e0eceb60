use std::collections::BTreeSet;

use crate::broker::error::{BrokerError, BrokerResult};

const MAX_NAME_LEN: usize = 64;

/// Service names end up in role names and session names, so they are kept to
/// a conservative character set.
pub fn validate_name(name: &str) -> BrokerResult<()> {
    if name.is_empty() {
        return Err(BrokerError::config("service name cannot be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(BrokerError::config(format!(
            "service name '{name}' is longer than {MAX_NAME_LEN} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(BrokerError::config(format!(
            "service name '{name}' may only contain letters, digits, '-' and '_'"
        )));
    }
    Ok(())
}

/// Trims every entry and rejects blank ones.
pub fn normalize_users(users: &BTreeSet<String>) -> BrokerResult<BTreeSet<String>> {
    let mut result = BTreeSet::new();
    for user in users {
        let user = user.trim();
        if user.is_empty() {
            return Err(BrokerError::config("restricted user cannot be blank"));
        }
        result.insert(user.to_string());
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        for name in ["analytics", "web_app-2", "A"] {
            assert!(validate_name(name).is_ok(), "{name}");
        }
        let long = "a".repeat(65);
        for name in ["", "has space", "dot.name", "slash/name", long.as_str()] {
            assert!(validate_name(name).is_err(), "{name:?}");
        }
    }

    #[test]
    fn test_normalize_users() {
        let users: BTreeSet<String> = [" alice", "bob ", "alice"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let users = normalize_users(&users).unwrap();
        assert_eq!(
            users.into_iter().collect::<Vec<_>>(),
            vec![String::from("alice"), String::from("bob")]
        );

        let users: BTreeSet<String> = [String::from("alice"), String::from("  ")].into();
        assert!(normalize_users(&users).is_err());
    }
}
