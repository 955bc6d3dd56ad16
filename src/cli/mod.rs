//! Command-line interface for Dataplate.
//!
//! Without a subcommand the web console is started.

mod commands;

use clap::{Parser, Subcommand};

/// Dataplate - data platform web console
#[derive(Parser)]
#[command(name = "dataplate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web console
    #[command(alias = "web")]
    Serve,

    /// Create a default config.toml if none exists
    #[command(alias = "--init")]
    Init,

    /// Manage the dataset catalog
    Dataset {
        #[command(subcommand)]
        command: DatasetCommands,
    },

    /// Manage saved queries
    Query {
        #[command(subcommand)]
        command: QueryCommands,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Manage the reports directory
    Reports {
        #[command(subcommand)]
        command: ReportsCommands,
    },
}

#[derive(Subcommand)]
pub enum DatasetCommands {
    /// Register a dataset
    Add {
        name: String,
        /// Storage location, e.g. s3a://bucket/path
        location: String,
        /// Storage format
        #[arg(long, default_value = "parquet")]
        format: String,
        #[arg(long)]
        description: Option<String>,
    },
    #[command(alias = "ls")]
    List,
}

#[derive(Subcommand)]
pub enum QueryCommands {
    /// Save a SQL template; `${name}` marks a parameter
    Add {
        name: String,
        sql: String,
        #[arg(long)]
        description: Option<String>,
    },
    #[command(alias = "ls")]
    List,
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Grant a role to a user who has logged in at least once
    Grant { username: String, role: String },

    /// Show the latest audited actions of a user
    History {
        username: String,
        #[arg(long, default_value = "20")]
        limit: u64,
    },
}

#[derive(Subcommand)]
pub enum ReportsCommands {
    /// Change the directory the report browser reads from
    SetLocation { path: String },
}

pub use commands::*;
