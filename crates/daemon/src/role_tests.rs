// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

use super::*;

#[test]
fn parses_boss_with_empty_instruction() {
    let role: DaemonRole = "boss".parse().unwrap();
    assert_eq!(role, DaemonRole::Boss { instruction: String::new() });
    assert_eq!(role.label(), "boss");
}

#[test]
fn parses_subordinate() {
    let role: DaemonRole = "subordinate".parse().unwrap();
    assert_eq!(role, DaemonRole::Subordinate);
    assert_eq!(role.label(), "subordinate");
}

#[test]
fn rejects_unknown_role() {
    let err = DaemonRole::from_str("manager").unwrap_err();
    assert_eq!(err.0, "manager");
}

#[test]
fn display_matches_label() {
    assert_eq!(DaemonRole::Subordinate.to_string(), "subordinate");
}
