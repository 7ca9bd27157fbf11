use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Personal book library with folder-to-catalog sync.
#[derive(Parser, Debug, Clone)]
#[command(name = "biblio-rs")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "BIBLIO_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the HTTP API (default if no command given).
    Serve {
        /// Address to bind the server to.
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// User management commands.
    User {
        /// User subcommand action.
        #[command(subcommand)]
        action: UserCommand,
    },

    /// Reconcile the catalog with the library folder.
    Sync {
        /// Sync subcommand action.
        #[command(subcommand)]
        action: SyncCommand,
    },

    /// Catalog maintenance routines.
    Catalog {
        /// Catalog subcommand action.
        #[command(subcommand)]
        action: CatalogCommand,
    },

    /// Initialize database and create default config.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// User management subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum UserCommand {
    /// Add a new user.
    Add {
        /// E-mail used to log in.
        email: String,
        /// Display name.
        #[arg(short, long)]
        name: String,
        /// Password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
        /// User role (admin or user).
        #[arg(short, long, default_value = "user")]
        role: String,
    },

    /// Delete a user.
    Del {
        /// E-mail of the user to delete.
        email: String,
    },

    /// List all users.
    List,

    /// Change user password.
    Passwd {
        /// E-mail of the user.
        email: String,
        /// New password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
    },
}

/// Options shared by the sync subcommands.
#[derive(clap::Args, Debug, Clone)]
pub struct SyncTarget {
    /// Library root (overrides `[library] root` from the config file).
    #[arg(long, env = "BIBLIO_LIBRARY_ROOT")]
    pub library: Option<PathBuf>,

    /// Restrict the run to one sub-folder, relative to the library root.
    #[arg(short, long, env = "BIBLIO_SUBFOLDER")]
    pub subfolder: Option<String>,
}

/// Sync subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum SyncCommand {
    /// Show what a sync would change without touching the catalog.
    Analyze {
        /// Library and scope selection.
        #[command(flatten)]
        target: SyncTarget,
        /// Maximum number of pending changes to print per list.
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Apply the sync: delete missing entries, insert new files.
    Apply {
        /// Library and scope selection.
        #[command(flatten)]
        target: SyncTarget,
        /// Generate covers for entries without one after a successful sync.
        #[arg(long, env = "BIBLIO_SYNC_COVERS")]
        covers: bool,
    },

    /// List the library's sub-folders (candidate sync scopes).
    Folders {
        /// Library root (overrides `[library] root` from the config file).
        #[arg(long, env = "BIBLIO_LIBRARY_ROOT")]
        library: Option<PathBuf>,
    },
}

/// Catalog maintenance subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum CatalogCommand {
    /// Generate covers for entries that have none.
    Covers,
    /// Refresh page counts from the book files.
    Pages,
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Library folder configuration.
    #[serde(default)]
    pub library: LibraryConfig,

    /// Cover generation configuration.
    #[serde(default)]
    pub covers: CoverConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Name reported by the API root.
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            title: default_title(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        8001,
    )
}

fn default_title() -> String {
    "My Library".to_string()
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/biblio.db")
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Registration mode: "open", "disabled".
    #[serde(default = "default_registration")]
    pub registration: String,

    /// Session token duration in days.
    #[serde(default = "default_session_days")]
    pub session_days: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            registration: default_registration(),
            session_days: default_session_days(),
        }
    }
}

fn default_registration() -> String {
    "open".to_string()
}

fn default_session_days() -> u32 {
    7
}

impl AuthConfig {
    /// Check if registration is enabled.
    pub fn registration_enabled(&self) -> bool {
        self.registration == "open"
    }
}

/// Library folder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Root folder holding the book files. The folder is authoritative for the catalog.
    #[serde(default = "default_library_root")]
    pub root: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: default_library_root(),
        }
    }
}

fn default_library_root() -> PathBuf {
    PathBuf::from("library")
}

impl LibraryConfig {
    /// Build a config pointing at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

/// Cover generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverConfig {
    /// Width of stored cover images in pixels.
    #[serde(default = "default_cover_width")]
    pub width: u32,

    /// JPEG quality (1-100).
    #[serde(default = "default_cover_quality")]
    pub quality: u8,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            width: default_cover_width(),
            quality: default_cover_quality(),
        }
    }
}

fn default_cover_width() -> u32 {
    300
}

fn default_cover_quality() -> u8 {
    80
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &PathBuf) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("biblio-rs.toml"),
            dirs::config_dir()
                .map(|p| p.join("biblio-rs").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/biblio-rs/config.toml"),
        ];

        candidates.into_iter().find(|p| p.exists())
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# biblio-rs configuration

[server]
bind = "0.0.0.0:8001"
title = "My Library"

[database]
# path = "/var/lib/biblio-rs/biblio.db"

[auth]
# Registration mode: "open" or "disabled"
registration = "open"
# Session duration in days
session_days = 7

[library]
# Folder holding the book files (pdf, epub, azw).
# The folder is the source of truth: `biblio-rs sync apply` removes catalog
# entries whose file is gone and inserts entries for new files.
root = "library"

[covers]
width = 300
quality = 80
"#
        .to_string()
    }
}

/// Supported book formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookFormat {
    /// PDF format (Portable Document Format).
    Pdf,
    /// EPUB format (Electronic Publication).
    Epub,
    /// AZW format (Kindle).
    Azw,
}

impl BookFormat {
    /// Get the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            BookFormat::Pdf => "application/pdf",
            BookFormat::Epub => "application/epub+zip",
            BookFormat::Azw => "application/vnd.amazon.ebook",
        }
    }

    /// Try to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(BookFormat::Pdf),
            "epub" => Some(BookFormat::Epub),
            "azw" => Some(BookFormat::Azw),
            _ => None,
        }
    }

    /// Detect format from a file path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}
