use clap::{Parser, Subcommand};
use slime_format::CompressionKind;
use std::path::PathBuf;

/// Inspect and rewrite slime world files
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// Print debug logs
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print bounds, chunk and entity counts, and load time
    Info {
        file: PathBuf,

        /// Compression the file was written with
        #[arg(long, default_value_t = CompressionKind::Zstd)]
        compression: CompressionKind,

        /// Emit the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Decode a world and encode it again
    Resave {
        input: PathBuf,

        output: PathBuf,

        /// Compression of the input file
        #[arg(long, default_value_t = CompressionKind::Zstd)]
        input_compression: CompressionKind,

        /// Compression for the output file
        #[arg(long, default_value_t = CompressionKind::Zstd)]
        compression: CompressionKind,

        /// Write empty tile entity, entity and extra segments
        #[arg(long)]
        minimal: bool,
    },
}
