// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Selector parsing: turns the CLI's `--selector` string into either "all
//! discovered" (`None`) or an explicit, canonicalized set of addresses.

use anyhow::{Context, Result};

use crate::{cfg::config::Config, utils::canonicalize_address};

/// Parses a selector string into a set of canonical addresses, or `None`
/// meaning "all discovered fixtures". Splits on `,` first, then resolves
/// each token independently — a `group:<name>` token expands to its
/// members, anything else is treated as a literal address — and unions the
/// results, so mixed selectors like `group:studio,cc:cc:cc:cc:cc:cc` work.
pub fn selector_to_addresses(selector: &str, cfg: &Config) -> Result<Option<Vec<String>>> {
    let trimmed = selector.trim();

    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") || trimmed == "*" {
        return Ok(None);
    }

    let mut addresses: Vec<String> = Vec::new();
    for token in trimmed.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if let Some(group_name) = token.strip_prefix("group:") {
            let members = cfg.resolve_group(group_name).with_context(|| format!("selector '{selector}'"))?;
            addresses.extend(members);
        } else {
            addresses.push(canonicalize_address(token));
        }
    }

    if addresses.is_empty() {
        return Ok(None);
    }

    Ok(Some(addresses))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::config::GroupMembers;

    fn empty_cfg() -> Config {
        Config::default()
    }

    #[test]
    fn test_selector_all_variants_mean_none() {
        let cfg = empty_cfg();
        assert_eq!(selector_to_addresses("ALL", &cfg).expect("ok"), None);
        assert_eq!(selector_to_addresses("*", &cfg).expect("ok"), None);
        assert_eq!(selector_to_addresses("", &cfg).expect("ok"), None);
        assert_eq!(selector_to_addresses("  all  ", &cfg).expect("ok"), None);
    }

    #[test]
    fn test_selector_comma_list_canonicalizes() {
        let cfg = empty_cfg();
        let addrs = selector_to_addresses("aa:bb:cc:dd:ee:ff, 11:22:33:44:55:66", &cfg)
            .expect("ok")
            .expect("some");
        assert_eq!(addrs, vec!["AA:BB:CC:DD:EE:FF", "11:22:33:44:55:66".to_uppercase()]);
    }

    #[test]
    fn test_selector_group_expands_membership() {
        let mut cfg = empty_cfg();
        cfg.groups.insert(
            "studio".to_string(),
            GroupMembers::List(vec!["aa:bb:cc:dd:ee:ff".to_string()]),
        );
        let addrs = selector_to_addresses("group:studio", &cfg).expect("ok").expect("some");
        assert_eq!(addrs, vec!["AA:BB:CC:DD:EE:FF"]);
    }

    #[test]
    fn test_selector_unknown_group_is_error() {
        let cfg = empty_cfg();
        assert!(selector_to_addresses("group:nope", &cfg).is_err());
    }

    #[test]
    fn test_selector_mixed_group_and_literal_tokens_union() {
        let mut cfg = empty_cfg();
        cfg.groups.insert(
            "studio".to_string(),
            GroupMembers::List(vec!["aa:bb:cc:dd:ee:ff".to_string()]),
        );
        let addrs = selector_to_addresses("group:studio,cc:cc:cc:cc:cc:cc", &cfg).expect("ok").expect("some");
        assert_eq!(addrs, vec!["AA:BB:CC:DD:EE:FF", "CC:CC:CC:CC:CC:CC"]);
    }
}
