//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Platen content-to-site compiler CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Content root directory (default: current directory)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve the site live, re-reading content on every request
    Preview {
        /// Interface to bind on
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value_t = 8080)]
        port: u16,

        /// Hide error details from 500 responses
        #[arg(long)]
        no_debug: bool,
    },

    /// Deletes the build directory if there is one and rebuilds the site
    Build {
        /// URL the site will be served under; prompted for when omitted
        #[arg(long = "url-root")]
        url_root: Option<String>,
    },
}
