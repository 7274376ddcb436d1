//! Cyber Guardian CLI
//!
//! CLI tool for validating domains, managing a whitelist file and checking
//! navigations against the rule set the extension would register.

mod simulate;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use cg_core::domain::{self, normalize};
use cg_core::engine::Verdict;
use cg_core::store::StorageArea;
use cg_core::types::ResourceType;
use cg_sync::whitelist::{add_toast, RemoveOutcome, WhitelistManager};
use cg_sync::FileStore;

#[derive(Parser)]
#[command(name = "cg-cli")]
#[command(about = "Cyber Guardian whitelist and rule tools")]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize and validate domains
    Validate {
        /// Domains to check
        #[arg(required = true)]
        domains: Vec<String>,
    },

    /// Print the full rule set for a stored whitelist as JSON
    Rules {
        /// Whitelist store file
        #[arg(short, long, default_value = "whitelist.json")]
        store: PathBuf,
    },

    /// Manage the stored whitelist
    Whitelist {
        /// Whitelist store file
        #[arg(short, long, default_value = "whitelist.json")]
        store: PathBuf,

        #[command(subcommand)]
        action: WhitelistAction,
    },

    /// Check whether a navigation would be allowed
    Check {
        /// URL to navigate to
        url: String,

        /// Whitelist store file
        #[arg(short, long, default_value = "whitelist.json")]
        store: PathBuf,

        /// Resource type of the request
        #[arg(short = 't', long = "type", default_value = "main_frame")]
        resource_type: String,
    },
}

#[derive(Subcommand)]
enum WhitelistAction {
    /// List whitelisted domains
    List,
    /// Add a domain
    Add { domain: String },
    /// Remove a domain
    Remove {
        domain: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match cli.command {
        Commands::Validate { domains } => cmd_validate(&domains),
        Commands::Rules { store } => cmd_rules(store),
        Commands::Whitelist { store, action } => cmd_whitelist(store, action),
        Commands::Check {
            url,
            store,
            resource_type,
        } => cmd_check(&url, store, &resource_type),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start tokio runtime: {}", e))
}

fn cmd_validate(domains: &[String]) -> Result<(), String> {
    let mut invalid = 0usize;

    for raw in domains {
        let normalized = normalize(raw);
        match domain::check(&normalized) {
            Ok(()) => println!("  ok       {}", normalized),
            Err(e) => {
                invalid += 1;
                println!("  invalid  {:?}: {}", raw, e);
            }
        }
    }

    if invalid > 0 {
        return Err(format!("{} of {} domains are invalid", invalid, domains.len()));
    }
    Ok(())
}

fn cmd_rules(store: PathBuf) -> Result<(), String> {
    let store = FileStore::new(store, StorageArea::Sync);
    let (rules, stats) = runtime()?.block_on(simulate::load_rules(&store))?;

    let json = serde_json::to_string_pretty(&rules)
        .map_err(|e| format!("Failed to serialize rules: {}", e))?;
    println!("{}", json);

    eprintln!(
        "{} rules ({} whitelist entries, {} duplicate, {} invalid)",
        rules.len(),
        stats.entries,
        stats.duplicates,
        stats.invalid
    );
    Ok(())
}

fn cmd_whitelist(store: PathBuf, action: WhitelistAction) -> Result<(), String> {
    let manager = WhitelistManager::new(Arc::new(FileStore::new(store, StorageArea::Sync)));
    let rt = runtime()?;

    match action {
        WhitelistAction::List => {
            let whitelist = rt.block_on(manager.list()).map_err(|e| e.to_string())?;
            if whitelist.is_empty() {
                println!("Whitelist is empty");
            }
            for domain in &whitelist {
                println!("{}", domain);
            }
            println!("Total: {}", whitelist.len());
        }
        WhitelistAction::Add { domain } => {
            let result = rt.block_on(manager.add(&domain));
            let toast = add_toast(&result);
            result.map_err(|_| toast.message.clone())?;
            println!("{}", toast.message);
        }
        WhitelistAction::Remove { domain, yes } => {
            let outcome = rt
                .block_on(manager.remove(&domain, |prompt| yes || confirm(prompt)))
                .map_err(|e| e.to_string())?;
            match outcome {
                RemoveOutcome::Removed { .. } => {
                    if let Some(toast) = outcome.toast() {
                        println!("{}", toast.message);
                    }
                }
                RemoveOutcome::Cancelled => println!("Cancelled"),
                RemoveOutcome::NotPresent => println!("\"{}\" is not in the whitelist", domain),
            }
        }
    }

    Ok(())
}

fn confirm(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    let _ = io::stdout().flush();

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn cmd_check(url: &str, store: PathBuf, resource_type: &str) -> Result<(), String> {
    let store = FileStore::new(store, StorageArea::Sync);
    let resource_type = ResourceType::from_name(resource_type);
    let verdict = runtime()?.block_on(simulate::check_url(&store, url, resource_type))?;

    match verdict {
        Verdict::Allow { rule_id: Some(id) } => println!("allow     {} (rule {})", url, id),
        Verdict::Allow { rule_id: None } => println!("allow     {} (no matching rule)", url),
        Verdict::Redirect {
            rule_id,
            extension_path,
        } => println!("redirect  {} -> {} (rule {})", url, extension_path, rule_id),
    }
    Ok(())
}
