mod cli_utils;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use cli_utils::Sources;
use commands::{cmd_alias, cmd_compile, cmd_data, cmd_list, cmd_name, cmd_parents, cmd_type};

#[derive(Parser)]
#[command(name = "mimedb")]
#[command(
    about = "Resolve MIME types by file name, content and type hierarchy",
    long_about = "mimedb - MIME type resolution over shared-mime-info data\n\n\
    Answers queries from binary mime.cache files and <mime-info> XML packages.\n\
    Caches are consulted first, in the order given, then packages.\n\n\
    Examples:\n\
      mimedb --cache /usr/share/mime/mime.cache name archive.tar.bz2\n\
      mimedb --cache /usr/share/mime/mime.cache data ./unknown.bin\n\
      mimedb --package custom.xml parents text/x-csrc --all\n\
      mimedb --package custom.xml compile --output mime.cache\n\n\
    Logging goes to stderr; set MIMEDB_LOG (or RUST_LOG) to e.g. debug."
)]
#[command(version)]
struct Cli {
    /// Binary mime.cache file (repeatable)
    #[arg(long = "cache", value_name = "PATH", global = true)]
    caches: Vec<PathBuf>,

    /// XML definition package (repeatable)
    #[arg(long = "package", value_name = "PATH", global = true)]
    packages: Vec<PathBuf>,

    /// JSON configuration file naming caches and packages
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the type of a file from its name
    Name {
        /// File name (only the name is matched, not its contents)
        #[arg(value_name = "FILE_NAME")]
        file_name: String,
    },

    /// Find the type of a file from its leading bytes
    Data {
        /// File to read, or "-" for stdin
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Show the record of a type
    Type {
        /// Type name or alias
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Show the parents of a type
    Parents {
        /// Type name or alias
        #[arg(value_name = "NAME")]
        name: String,

        /// Show every ancestor instead of direct parents
        #[arg(short, long)]
        all: bool,
    },

    /// Resolve an alias to its canonical type name
    Alias {
        /// Type name
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// List every known type
    List,

    /// Compile the given packages into a binary mime.cache
    Compile {
        /// Output cache file
        #[arg(short, long, value_name = "PATH")]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    cli_utils::init_logging();

    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    let sources = Sources {
        caches: cli.caches,
        packages: cli.packages,
        config: cli.config,
    };
    let json = cli.json;

    match cli.command {
        Commands::Name { file_name } => cmd_name(&sources, &file_name, json),
        Commands::Data { path } => cmd_data(&sources, &path, json),
        Commands::Type { name } => cmd_type(&sources, &name, json),
        Commands::Parents { name, all } => cmd_parents(&sources, &name, all, json),
        Commands::Alias { name } => cmd_alias(&sources, &name, json),
        Commands::List => cmd_list(&sources, json),
        Commands::Compile { output } => cmd_compile(&sources, &output, json),
    }
}
