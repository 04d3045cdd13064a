//! TAG Diary maintenance CLI (tagd-admin)
//!
//! ```bash
//! tagd-admin create-user alice s3cret --email alice@example.com --admin
//! tagd-admin reset-password alice n3wpass
//! tagd-admin list-users
//! tagd-admin check-photos
//! tagd-admin file-sources --fix
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tagd_common::config::{self, TomlConfig};
use tagd_common::db::init_database;
use tagd_server::maintenance::{self, NewAccount};
use tagd_server::storage::build_store;

#[derive(Parser, Debug)]
#[command(name = "tagd-admin")]
#[command(about = "TAG Diary maintenance commands")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "TAGD_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Root folder holding the database and uploads
    #[arg(short, long, env = "TAGD_ROOT_FOLDER", global = true)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account without an invite code
    CreateUser {
        username: String,
        password: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        full_name: Option<String>,
        /// Grant administrator rights
        #[arg(long)]
        admin: bool,
    },
    /// Set a new password for an account
    ResetPassword { username: String, password: String },
    /// List all accounts
    ListUsers,
    /// Report orphaned photos and missing photo files
    CheckPhotos,
    /// Report files tagged as vignette attachments
    FileSources {
        /// Retag them as Files page uploads
        #[arg(long)]
        fix: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), &config);
    let db_path = config::database_path(&root_folder);
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let cost = config.auth.bcrypt_cost;

    match args.command {
        Command::CreateUser {
            username,
            password,
            email,
            full_name,
            admin,
        } => {
            let account = NewAccount {
                username,
                password,
                email,
                full_name,
                is_admin: admin,
            };
            let user = maintenance::create_user(&pool, &account, cost).await?;
            println!(
                "Created user '{}' (id {}{})",
                user.username,
                user.id,
                if user.is_admin { ", admin" } else { "" }
            );
        }
        Command::ResetPassword { username, password } => {
            maintenance::reset_password(&pool, &username, &password, cost).await?;
            println!("Password for '{}' has been reset", username);
        }
        Command::ListUsers => {
            let users = maintenance::list_users(&pool).await?;
            if users.is_empty() {
                println!("No users found");
            }
            for user in users {
                println!(
                    "{:4} | {:20} | {:30} | {}{}",
                    user.id,
                    user.username,
                    user.email.as_deref().unwrap_or("-"),
                    user.created_at.format("%Y-%m-%d %H:%M"),
                    if user.is_admin { " | admin" } else { "" }
                );
            }
        }
        Command::CheckPhotos => {
            let store = build_store(&config, &config::uploads_dir(&root_folder))?;
            let report = maintenance::check_photos(&pool, store.as_ref()).await?;

            println!("Total photos: {}", report.total);
            println!("Photos with missing uploader: {}", report.orphaned.len());
            for photo in &report.orphaned {
                println!("  {:4} | {} | uploader {}", photo.id, photo.filename, photo.uploaded_by_id);
            }
            println!("Photos with missing files: {}", report.missing_files.len());
            for photo in &report.missing_files {
                println!("  {:4} | {}", photo.id, photo.file_path);
            }
            if report.is_healthy() {
                println!("All photos OK");
            }
        }
        Command::FileSources { fix } => {
            let report = maintenance::file_sources(&pool, fix).await?;

            println!("Files tagged as 'vignettes': {}", report.mistagged.len());
            for file in &report.mistagged {
                println!(
                    "  {:4} | {} | {}",
                    file.id,
                    file.created_at.format("%Y-%m-%d %H:%M"),
                    file.title.as_deref().unwrap_or(&file.filename)
                );
            }
            if fix {
                println!("Retagged {} file(s) as 'files'", report.fixed);
            } else if !report.mistagged.is_empty() {
                println!("Run with --fix to move them to the Files page");
            }
        }
    }

    pool.close().await;
    Ok(())
}
