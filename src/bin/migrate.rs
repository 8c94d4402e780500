use anyhow::{anyhow, Result};
use std::io::{self, Write};
use std::path::Path;
use workout_deposit_bot::config::{database_url_from_env, sqlite_path};
use workout_deposit_bot::database::connection::DatabaseManager;

/// Maintenance actions for the coach database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Up,
    Status,
    Reset { confirmed: bool },
    Help,
}

impl Command {
    fn parse(args: &[String]) -> Option<Self> {
        let confirmed = args.iter().skip(1).any(|a| a == "--yes" || a == "-y");
        match args.first().map(String::as_str).unwrap_or("up") {
            "up" | "migrate" => Some(Command::Up),
            "status" | "check" => Some(Command::Status),
            "reset" => Some(Command::Reset { confirmed }),
            "help" | "--help" | "-h" => Some(Command::Help),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = Command::parse(&args) else {
        eprintln!("Unknown command: {}", args.join(" "));
        print_help();
        std::process::exit(1);
    };

    let database_url = database_url_from_env();
    match command {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Up => {
            migrate(&database_url).await?;
            Ok(())
        }
        Command::Status => status(&database_url).await,
        Command::Reset { confirmed } => reset(&database_url, confirmed).await,
    }
}

async fn migrate(database_url: &str) -> Result<DatabaseManager> {
    println!("📊 Database: {}", mask_url(database_url));
    if let Some(parent) = Path::new(sqlite_path(database_url)).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            println!("📁 Creating directory: {}", parent.display());
            std::fs::create_dir_all(parent)?;
        }
    }

    let db = DatabaseManager::new(database_url)
        .await
        .map_err(|e| anyhow!("Failed to connect to database: {e}"))?;
    db.run_migrations().await?;
    println!("✅ Schema is up to date");
    Ok(db)
}

async fn status(database_url: &str) -> Result<()> {
    println!("📊 Database: {}", mask_url(database_url));
    let db = DatabaseManager::new(database_url)
        .await
        .map_err(|e| anyhow!("Failed to connect to database: {e}"))?;

    let tables = db.table_names().await?;
    if tables.is_empty() {
        println!("⚠️  No tables yet, run `migrate up` first");
        return Ok(());
    }
    println!("📋 Tables: {}", tables.join(", "));

    match db.stats().await {
        Ok(stats) => {
            println!("👤 Users: {}", stats.users);
            println!("📸 Photos: {} ({} verified)", stats.captures, stats.verified_captures);
        }
        Err(e) => println!("⚠️  Schema looks incomplete: {e}"),
    }
    Ok(())
}

async fn reset(database_url: &str, confirmed: bool) -> Result<()> {
    if !confirmed && !ask("⚠️  Delete ALL users, deposits and photos? (yes/no) ")? {
        println!("❌ Reset cancelled");
        return Ok(());
    }

    let db = migrate(database_url).await?;
    db.truncate_all().await?;
    println!("🗑️  All rows deleted, schema kept");
    Ok(())
}

fn ask(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("yes"))
}

fn mask_url(url: &str) -> String {
    match Path::new(sqlite_path(url)).file_name() {
        Some(name) if url.starts_with("sqlite:") => format!("sqlite:.../{}", name.to_string_lossy()),
        _ => url.to_string(),
    }
}

fn print_help() {
    println!("🏋️ Workout Deposit Bot database tool");
    println!();
    println!("USAGE:");
    println!("    migrate [COMMAND] [--yes]");
    println!();
    println!("COMMANDS:");
    println!("    up        Apply pending migrations (default)");
    println!("    status    Show tables and user/photo counts");
    println!("    reset     Delete every user and photo, keep the schema");
    println!("    help      Show this message");
    println!();
    println!("ENVIRONMENT:");
    println!("    DATABASE_URL   (default: sqlite:./data/coach.db)");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse(&[]), Some(Command::Up));
        assert_eq!(Command::parse(&args(&["migrate"])), Some(Command::Up));
        assert_eq!(Command::parse(&args(&["check"])), Some(Command::Status));
        assert_eq!(Command::parse(&args(&["reset"])), Some(Command::Reset { confirmed: false }));
        assert_eq!(Command::parse(&args(&["reset", "--yes"])), Some(Command::Reset { confirmed: true }));
        assert_eq!(Command::parse(&args(&["-h"])), Some(Command::Help));
        assert_eq!(Command::parse(&args(&["drop"])), None);
    }

    #[test]
    fn test_mask_url_hides_directories() {
        assert_eq!(mask_url("sqlite:./data/coach.db"), "sqlite:.../coach.db");
        assert_eq!(mask_url("sqlite:///var/lib/bot/coach.db"), "sqlite:.../coach.db");
        assert_eq!(mask_url("postgres://db/coach"), "postgres://db/coach");
    }
}
