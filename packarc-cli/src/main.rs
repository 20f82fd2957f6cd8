//! `packarc`: CLI front end for the PackArc library crates.

mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "packarc", version, about = "Pure Rust compression and archive tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress a single file (.lzma or .gz).
    Compress {
        /// Input file.
        input: PathBuf,
        /// Output file (defaults to the input plus an extension).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output format: lzma or gzip.
        #[arg(short, long, default_value = "lzma")]
        format: String,
        /// Compression level 0-9.
        #[arg(short, long, default_value_t = 6)]
        level: u8,
    },
    /// Decompress a .lzma, .gz or .Z file.
    Decompress {
        /// Input file.
        input: PathBuf,
        /// Output file (defaults to the input minus its extension).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Create a tar or ar archive from files.
    Create {
        /// Archive to create.
        archive: PathBuf,
        /// Files to add.
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Archive format: tar or ar (default from the extension).
        #[arg(short, long)]
        format: Option<String>,
    },
    /// List the entries of a tar or ar archive.
    List {
        /// Archive to list.
        archive: PathBuf,
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Extract a tar or ar archive.
    Extract {
        /// Archive to extract.
        archive: PathBuf,
        /// Destination directory.
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
        /// Overwrite existing files.
        #[arg(long)]
        force: bool,
    },
    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Compress {
            input,
            output,
            format,
            level,
        } => commands::compress(&input, output.as_deref(), &format, level),
        Command::Decompress { input, output } => {
            commands::decompress(&input, output.as_deref())
        }
        Command::Create {
            archive,
            files,
            format,
        } => commands::create(&archive, &files, format.as_deref()),
        Command::List { archive, json } => commands::list(&archive, json),
        Command::Extract {
            archive,
            dir,
            force,
        } => commands::extract(&archive, &dir, force),
        Command::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "packarc",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("packarc: {err}");
            ExitCode::FAILURE
        }
    }
}
