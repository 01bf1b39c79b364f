// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Continuity - a local memory service for AI coding agents.
//!
//! Binary entry point: the HTTP server, the hook adapter invoked by the
//! coding agent, and maintenance subcommands.

use clap::{Parser, Subcommand};

use continuity::{hooks, serve};

/// Continuity - session memory for AI coding agents.
#[derive(Parser, Debug)]
#[command(name = "continuity", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP API server.
    Serve,
    /// Handle a lifecycle hook event (reads JSON from stdin).
    Hook {
        /// Event name: start, submit, tool, stop, or end.
        event: String,
    },
    /// Collapse near-duplicate memories and sweep orphaned directories.
    Dedup {
        /// Cosine similarity threshold for considering leaves duplicates.
        #[arg(long, default_value_t = continuity_engine::DEDUP_THRESHOLD)]
        threshold: f64,
    },
    /// Search stored memories from the command line.
    Search {
        /// Query text.
        query: String,
        /// Max results.
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Restrict to one category.
        #[arg(long)]
        category: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve => serve::run_serve().await,
        Commands::Hook { event } => {
            hooks::handle(&event).await;
            Ok(())
        }
        Commands::Dedup { threshold } => serve::run_dedup(threshold).await,
        Commands::Search {
            query,
            limit,
            category,
        } => serve::run_search(&query, limit, category.as_deref()).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
