// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! Black-box end-to-end checks against the compiled `foreman` and
//! `foremand` binaries (§8 concrete scenarios, operator-surface slice).
//!
//! These deliberately avoid touching a live Redis instance or spawning a
//! real child tool — the pipeline-level scenarios (decompose → enqueue →
//! execute → review) are covered in-process against fakes in
//! `foreman-engine`'s `boss_tests`/`subordinate_tests`. What's left to
//! verify here is the operator surface itself: argument parsing, help
//! text, and exit codes for the cases that don't require external state.

use assert_cmd::Command;

#[test]
fn foreman_help_lists_operator_subcommands() {
    let mut cmd = Command::cargo_bin("foreman").unwrap();
    let output = cmd.arg("--help").assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    for sub in ["submit", "status", "queue", "cancel"] {
        assert!(stdout.contains(sub), "help text missing `{sub}`: {stdout}");
    }
}

#[test]
fn foreman_cancel_without_job_id_is_a_clap_usage_error() {
    let mut cmd = Command::cargo_bin("foreman").unwrap();
    cmd.arg("cancel").assert().failure().code(2);
}

#[test]
fn foreman_unknown_subcommand_is_a_clap_usage_error() {
    let mut cmd = Command::cargo_bin("foreman").unwrap();
    cmd.arg("frobnicate").assert().failure().code(2);
}

#[test]
fn foremand_without_a_role_fails_with_exit_code_one() {
    let mut cmd = Command::cargo_bin("foremand").unwrap();
    cmd.assert().failure().code(1);
}

#[test]
fn foremand_rejects_an_unknown_role() {
    let mut cmd = Command::cargo_bin("foremand").unwrap();
    let assert = cmd.arg("manager").assert().failure().code(1);
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("unknown role"), "unexpected stderr: {stderr}");
}

#[test]
fn foremand_config_requires_a_path() {
    let mut cmd = Command::cargo_bin("foremand").unwrap();
    cmd.args(["subordinate", "--config"]).assert().failure().code(1);
}
