// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

//! `foremand`: the daemon binary. Usage:
//!
//! ```text
//! foremand boss "<instruction>" [--config path.toml]
//! foremand subordinate [--config path.toml]
//! ```
//!
//! Role, workspace, and Redis settings otherwise come from `EngineConfig`'s
//! layered defaults/file/env resolution (§10.3).

use foreman_daemon::{role::ParseRoleError, DaemonRole};
use foreman_engine::EngineConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FOREMAN_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

struct Args {
    role: DaemonRole,
    config_file: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut argv = std::env::args().skip(1);
    let role_str = argv.next().ok_or_else(|| "missing role (boss|subordinate)".to_string())?;
    let mut role = DaemonRole::from_str(&role_str).map_err(|ParseRoleError(got)| {
        format!("unknown role `{got}`, expected `boss` or `subordinate`")
    })?;

    let mut config_file = None;
    let mut rest: Vec<String> = Vec::new();
    let mut iter = argv.peekable();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let path = iter.next().ok_or_else(|| "--config requires a path".to_string())?;
            config_file = Some(PathBuf::from(path));
        } else {
            rest.push(arg);
        }
    }

    if let DaemonRole::Boss { instruction } = &mut role {
        *instruction = rest.join(" ");
    }

    Ok(Args { role, config_file })
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("foremand: {msg}");
            return ExitCode::from(1);
        }
    };

    let config = match EngineConfig::load(args.config_file.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::from(1);
        }
    };

    match foreman_daemon::run(args.role, config).await {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            tracing::error!(error = %e, "foremand exiting");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
