// bookbind-cli/src/cli.rs
//
// Defines the command-line argument structures using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

// --- CLI Argument Definition ---

#[derive(Parser, Debug)]
#[command(
    author,
    version, // Reads from Cargo.toml via "cargo" feature in clap
    about = "Bookbind: audiobook conversion tool",
    long_about = "Converts and merges audio files into a single chaptered m4b audiobook using ffmpeg via the bookbind-core library."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Converts and merges audio files into one audiobook
    Convert(ConvertArgs),
    /// Probes audio files and prints their properties as JSON
    Probe(ProbeArgs),
}

#[derive(Parser, Debug)]
pub struct ConvertArgs {
    /// Input audio files, in audiobook order
    #[arg(required = true, value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// Path of the audiobook to produce
    #[arg(short = 'o', long = "output", required = true, value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Optional: cover art image to embed
    #[arg(long, value_name = "IMAGE")]
    pub cover: Option<PathBuf>,

    /// Optional: number of concurrent transcodes (defaults to CPU count)
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Optional: audio bitrate override in bits per second
    #[arg(long, value_name = "BPS")]
    pub bitrate: Option<u32>,
}

#[derive(Parser, Debug)]
pub struct ProbeArgs {
    /// Input audio files to probe
    #[arg(required = true, value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,
}
