//! biblio-rs entry point.

use biblio_rs::{
    auth::AuthService,
    config::{CatalogCommand, Cli, Command, Config, SyncCommand, SyncTarget, UserCommand},
    db::{Database, timestamp_to_datetime},
    library::{self, Reconciler, SyncAnalysis},
    server,
};
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "biblio_rs=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let config = if let Some(ref path) = config_path {
        tracing::debug!(path = %path.display(), "Loading config");
        Config::load(path)?
    } else {
        Config::default()
    };

    match cli.command {
        Some(Command::Init { force }) => cmd_init(force).await,
        Some(Command::User { action }) => cmd_user(action, &config).await,
        Some(Command::Sync { action }) => cmd_sync(action, config).await,
        Some(Command::Catalog { action }) => cmd_catalog(action, &config).await,
        Some(Command::Serve { bind }) => cmd_serve(config, bind).await,
        None => cmd_serve(config, None).await,
    }
}

/// Initialize config and database.
async fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());

    let config = Config::default();
    let _db = Database::open(&config.database.path)?;
    println!("Initialized database: {}", config.database.path.display());

    std::fs::create_dir_all(&config.library.root)?;
    println!("Library folder: {}", config.library.root.display());

    println!("\nEdit config.toml to point [library] root at your books.");
    println!("Then run: biblio-rs user add <email> --name <name> --role admin");
    println!("And: biblio-rs sync analyze");

    Ok(())
}

/// User management commands.
async fn cmd_user(action: UserCommand, config: &Config) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;
    let auth = AuthService::new(
        db,
        config.auth.session_days,
        config.auth.registration_enabled(),
    );

    match action {
        UserCommand::Add {
            email,
            name,
            password,
            role,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password("Password: ")?,
            };

            let user = auth.create_user(&name, &email, &password, &role)?;
            println!(
                "Created user: {} <{}> (role: {}, id: {})",
                user.name, user.email, user.role, user.id
            );
        }

        UserCommand::Del { email } => {
            if auth.delete_user(&email)? {
                println!("Deleted user: {}", email);
            } else {
                println!("User not found: {}", email);
            }
        }

        UserCommand::List => {
            let users = auth.list_users()?;
            if users.is_empty() {
                println!("No users found.");
            } else {
                println!("{:<32} {:<20} {:<8} LAST LOGIN", "E-MAIL", "NAME", "ROLE");
                println!("{}", "-".repeat(80));
                for user in users {
                    let last_login = user
                        .last_login
                        .map(|ts| timestamp_to_datetime(ts).format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "never".to_string());
                    println!(
                        "{:<32} {:<20} {:<8} {}",
                        user.email, user.name, user.role, last_login
                    );
                }
            }
        }

        UserCommand::Passwd { email, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password("New password: ")?,
            };

            if auth.change_password(&email, &password)? {
                println!("Password changed for: {}", email);
            } else {
                println!("User not found: {}", email);
            }
        }
    }

    Ok(())
}

/// Apply `--library` and build a reconciler.
fn reconciler_for(mut config: Config, target: &SyncTarget) -> anyhow::Result<Reconciler> {
    if let Some(root) = &target.library {
        config.library.root = root.clone();
    }

    let db = Database::open(&config.database.path)?;
    Ok(Reconciler::new(db, config.library, config.covers))
}

/// Catalog sync commands.
async fn cmd_sync(action: SyncCommand, config: Config) -> anyhow::Result<()> {
    match action {
        SyncCommand::Analyze { target, limit } => {
            let reconciler = reconciler_for(config, &target)?;
            let analysis = reconciler.analyze(target.subfolder.as_deref())?;
            print_analysis(&analysis, limit);
        }

        SyncCommand::Apply { target, covers } => {
            let reconciler = reconciler_for(config, &target)?;
            let outcome = reconciler.apply(target.subfolder.as_deref(), covers)?;

            println!("Sync complete.");
            println!("  Catalog before: {}", outcome.catalog_before);
            println!("  Deleted:        {}", outcome.deleted);
            println!("  Inserted:       {}", outcome.inserted);
            println!("  Catalog after:  {}", outcome.catalog_after);

            if let Some(summary) = outcome.covers {
                println!(
                    "  Covers: {} generated, {} without cover, {} missing files, {} failed",
                    summary.generated, summary.no_cover, summary.missing_file, summary.failed
                );
            }
        }

        SyncCommand::Folders { library } => {
            let root = library.unwrap_or(config.library.root);
            let folders = library::list_subfolders(&root)?;

            println!("{}", root.display());
            for folder in folders {
                println!("{}", folder.tree_label());
            }
        }
    }

    Ok(())
}

fn print_analysis(analysis: &SyncAnalysis, limit: usize) {
    println!("Scope:            {}", analysis.scope);
    println!("Files in folder:  {}", analysis.total_in_folder);
    println!("Rows in catalog:  {}", analysis.total_in_catalog);
    println!("To insert:        {}", analysis.to_insert_count);
    println!("To delete:        {}", analysis.to_delete_count);

    for (label, keys) in [
        ("Insert", &analysis.inserted_preview),
        ("Delete", &analysis.deleted_preview),
    ] {
        if keys.is_empty() {
            continue;
        }
        println!("\n{}:", label);
        for key in keys.iter().take(limit) {
            println!("  {}", key);
        }
        if keys.len() > limit {
            println!("  ... and {} more", keys.len() - limit);
        }
    }

    if !analysis.duplicates.is_empty() {
        println!("\nDuplicate catalog rows (only the later one is matched):");
        for dup in &analysis.duplicates {
            println!("  {} (kept #{}, shadowed #{})", dup.key, dup.kept_id, dup.shadowed_id);
        }
    }
}

/// Catalog maintenance commands.
async fn cmd_catalog(action: CatalogCommand, config: &Config) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;
    let root = &config.library.root;

    match action {
        CatalogCommand::Covers => {
            let summary = library::generate_missing_covers(&db, root, &config.covers)?;
            println!(
                "Processed {}: {} generated, {} without cover, {} missing files, {} failed",
                summary.processed,
                summary.generated,
                summary.no_cover,
                summary.missing_file,
                summary.failed
            );
        }

        CatalogCommand::Pages => {
            let summary = library::update_page_counts(&db, root)?;
            println!(
                "Page counts: {} updated, {} skipped, {} failed",
                summary.updated, summary.skipped, summary.failed
            );
        }
    }

    Ok(())
}

/// Start the server.
async fn cmd_serve(mut config: Config, bind: Option<std::net::SocketAddr>) -> anyhow::Result<()> {
    if let Some(addr) = bind {
        config.server.bind = addr;
    }

    let db = Database::open(&config.database.path)?;

    let expired = db.cleanup_expired_sessions()?;
    if expired > 0 {
        tracing::info!(expired, "Removed expired sessions");
    }

    if !config.library.root.is_dir() {
        tracing::warn!(
            root = %config.library.root.display(),
            "Library root does not exist; sync requests will fail until it does"
        );
    }

    let auth = AuthService::new(
        db.clone(),
        config.auth.session_days,
        config.auth.registration_enabled(),
    );

    tracing::info!(
        bind = %config.server.bind,
        database = %config.database.path.display(),
        library = %config.library.root.display(),
        "Starting biblio-rs server"
    );

    let bind_addr = config.server.bind;
    let state = server::AppState::new(config, db, auth);
    let app = server::create_router(state);

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(address = %bind_addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Prompt for password input.
fn prompt_password(prompt: &str) -> anyhow::Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;

    Ok(password.trim().to_string())
}
