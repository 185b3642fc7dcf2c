// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI/env configuration for `cortexd`, loaded from flags with a `.env`
//! fallback, expressed through `clap`'s derive+env support rather than
//! hand-rolled `std::env::var` lookups since this binary's surface is
//! HTTP, not IPC.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "cortexd", about = "Autonomous-agent execution control plane")]
pub struct Config {
    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Address the HTTP/SSE surface binds to.
    #[arg(long, env = "CORTEX_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: SocketAddr,

    /// Number of concurrent `agent_execute` claim loops.
    #[arg(long, env = "CORTEX_WORKER_CONCURRENCY", default_value_t = 4)]
    pub worker_concurrency: usize,

    /// Interval between reaper sweeps, in seconds.
    #[arg(long, env = "CORTEX_REAP_POLL_SECONDS", default_value_t = 60)]
    pub reap_poll_seconds: u64,

    /// How long a job's heartbeat may go silent before it is reaped.
    #[arg(long, env = "CORTEX_REAP_AFTER_SECONDS", default_value_t = 90)]
    pub reap_after_seconds: u64,
}

impl Config {
    pub fn reap_poll_interval(&self) -> Duration {
        Duration::from_secs(self.reap_poll_seconds)
    }

    pub fn reap_after(&self) -> Duration {
        Duration::from_secs(self.reap_after_seconds)
    }
}
