use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use offnote_core::VERSION;

/// Offnote - offline-first notes with an encrypted local mirror
#[derive(Parser)]
#[command(name = "offnote")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the local database
    #[arg(long, global = true, env = "OFFNOTE_DB")]
    pub db: Option<String>,

    /// User identity whose notes to operate on
    #[arg(short, long, global = true, env = "OFFNOTE_USER")]
    pub user: Option<String>,

    /// Path to the config file
    #[arg(long, global = true, env = "OFFNOTE_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Arguments for the `init` command
#[derive(Args)]
pub struct InitArgs {
    /// Database path to record in the new config
    #[arg(value_name = "PATH")]
    pub path: Option<String>,

    /// Origin the application shell is fetched from
    #[arg(long)]
    pub origin: Option<String>,

    /// Overwrite an existing config
    #[arg(long)]
    pub force: bool,
}

#[derive(Subcommand)]
pub enum NotesCommand {
    /// List mirrored notes
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add or replace a note in the mirror
    Add {
        #[arg(long)]
        title: String,

        /// Note body (reads stdin when omitted and stdin is not a terminal)
        #[arg(long)]
        content: Option<String>,

        /// Note ID (a new UUID when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Add tags to the note
        #[arg(short, long, value_name = "TAG")]
        tag: Vec<String>,
    },

    /// Show a single note
    Show {
        #[arg(value_name = "ID")]
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a note from the mirror
    Delete {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Print when the mirror was last written
    LastSync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Erase the user's mirror and encryption key
    Forget,
}

#[derive(Subcommand)]
pub enum CacheCommand {
    /// Install a new cache generation seeded with the configured shell
    Install,

    /// Fetch a URL through the request cache
    Fetch {
        #[arg(value_name = "URL")]
        url: String,

        /// Treat the request as a document navigation
        #[arg(long)]
        document: bool,

        /// HTTP method
        #[arg(long, default_value = "GET")]
        method: String,

        /// Print the response body
        #[arg(long)]
        body: bool,
    },

    /// List cache generations
    Generations {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete every cache generation
    Clear,

    /// Post a raw worker message, e.g. '{"type":"SKIP_WAITING"}'
    Message {
        #[arg(value_name = "JSON")]
        message: String,
    },
}

#[derive(Subcommand)]
pub enum BackupCommand {
    /// Write an encrypted backup of the user's notes
    Export {
        /// Destination path
        #[arg(value_name = "DEST")]
        destination: String,
    },

    /// Restore notes from an encrypted backup
    Import {
        /// Backup file to read
        #[arg(value_name = "SRC")]
        source: String,

        /// Replace the mirror instead of merging by note ID
        #[arg(long)]
        replace: bool,
    },
}

/// Arguments for the `completions` command
#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_name = "SHELL")]
    pub shell: Shell,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config and create the local database
    Init(InitArgs),

    /// Work with the encrypted note mirror
    Notes {
        #[command(subcommand)]
        command: NotesCommand,
    },

    /// Work with the request cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    /// Passphrase-encrypted export and import
    Backup {
        #[command(subcommand)]
        command: BackupCommand,
    },

    /// Generate shell completions
    Completions(CompletionsArgs),
}
