//! SQLShield CLI binary.
//!
//! SQL injection detection from the command line.
//!
//! # Commands
//!
//! - `check` - Classify a single query (rules + model)
//! - `serve` - Start the HTTP detection server
//! - `stats` - Print decision log counters
//! - `rules` - List the active rule set

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sqlshield::{
    config::Config,
    detector::Detector,
    model::{FallbackPolicy, Label, ModelAdapter, DEFAULT_ARTIFACTS_DIR},
    rules::RuleSet,
    server::{create_router, AppState, ServerConfig},
    storage::QueryLog,
    VERSION,
};

#[derive(Parser)]
#[command(name = "sqlshield")]
#[command(version = VERSION)]
#[command(about = "SQLShield - two-stage SQL injection detection", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a single query (exits 1 on a sqli verdict)
    Check {
        /// Query text (or - for stdin)
        query: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Model artifacts directory
        #[arg(long, default_value = DEFAULT_ARTIFACTS_DIR)]
        artifacts: PathBuf,

        /// Rules file replacing the built-in set
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Label queries as sqli when the model stage fails
        #[arg(long)]
        fail_closed: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP detection server
    Serve {
        /// Listen port
        #[arg(short, long)]
        port: Option<u16>,

        /// Listen host
        #[arg(long)]
        host: Option<String>,

        /// Bind to all interfaces
        #[arg(long)]
        bind_all: bool,

        /// TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Model artifacts directory
        #[arg(long)]
        artifacts: Option<PathBuf>,

        /// Decision log database path
        #[arg(long)]
        db: Option<PathBuf>,

        /// Rules file replacing the built-in set
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Label queries as sqli when the model stage fails
        #[arg(long)]
        fail_closed: bool,

        /// Disable permissive CORS
        #[arg(long)]
        no_cors: bool,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print decision log counters
    Stats {
        /// Decision log database path
        #[arg(long, default_value = "sqlshield.db")]
        db: PathBuf,

        /// Also print the most recent N entries
        #[arg(short, long)]
        tail: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the active rule set
    Rules {
        /// Rules file replacing the built-in set
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            query,
            file,
            artifacts,
            rules,
            fail_closed,
            json,
        } => cmd_check(query, file, &artifacts, rules, fail_closed, json),

        Commands::Serve {
            port,
            host,
            bind_all,
            config,
            artifacts,
            db,
            rules,
            fail_closed,
            no_cors,
            verbose,
        } => cmd_serve(ServeArgs {
            port,
            host,
            bind_all,
            config,
            artifacts,
            db,
            rules,
            fail_closed,
            no_cors,
            verbose,
        }),

        Commands::Stats { db, tail, json } => cmd_stats(&db, tail, json),

        Commands::Rules { rules, json } => cmd_rules(rules, json),
    }
}

fn cmd_check(
    query: Option<String>,
    file: Option<PathBuf>,
    artifacts: &std::path::Path,
    rules: Option<PathBuf>,
    fail_closed: bool,
    json_output: bool,
) -> anyhow::Result<()> {
    let query = read_input(query, file)?;

    let policy = if fail_closed {
        FallbackPolicy::FailClosed
    } else {
        FallbackPolicy::FailOpen
    };

    let rule_set = load_rules(rules)?;
    let adapter = ModelAdapter::load(artifacts, policy)?;
    let detector = Detector::new(rule_set, Box::new(adapter));

    let decision = detector.resolve(&query);

    if json_output {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else {
        let verdict = match decision.label {
            Label::Safe => "SAFE",
            Label::Sqli => "SQLI",
        };
        match decision.confidence {
            Some(confidence) => {
                println!(
                    "{verdict} (confidence: {confidence:.2}, reason: {})",
                    decision.reason
                );
            },
            None => println!("{verdict} (reason: {})", decision.reason),
        }
    }

    if decision.label == Label::Sqli {
        std::process::exit(1);
    }

    Ok(())
}

/// Arguments to `serve`, resolved against the config file and environment.
struct ServeArgs {
    port: Option<u16>,
    host: Option<String>,
    bind_all: bool,
    config: Option<PathBuf>,
    artifacts: Option<PathBuf>,
    db: Option<PathBuf>,
    rules: Option<PathBuf>,
    fail_closed: bool,
    no_cors: bool,
    verbose: bool,
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    // Layered config: file, environment, CLI flags
    let mut config = match args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env()?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(dir) = args.artifacts {
        config.model.artifacts_dir = dir;
    }
    if let Some(path) = args.db {
        config.storage.db_path = path;
    }
    if let Some(path) = args.rules {
        config.detection.rules_file = Some(path);
    }
    if args.fail_closed {
        config.detection.fallback = FallbackPolicy::FailClosed;
    }
    if args.no_cors {
        config.server.cors = false;
    }

    // Build the pipeline; a missing or malformed model is fatal here
    let rule_set = load_rules(config.detection.rules_file.clone())?;
    let adapter = ModelAdapter::load(&config.model.artifacts_dir, config.detection.fallback)?;
    let detector = Detector::new(rule_set, Box::new(adapter));
    let log = QueryLog::open(&config.storage.db_path)?;

    let mut server_config = ServerConfig::default().with_port(config.server.port);
    if args.bind_all {
        server_config = server_config.bind_all();
    } else {
        let addr: std::net::SocketAddr = config.server.listen_addr().parse()?;
        server_config = server_config.with_addr(addr);
    }
    if !config.server.cors {
        server_config = server_config.without_cors();
    }

    tracing::info!("Starting SQLShield server on {}", server_config.addr);
    tracing::info!(
        "Rules: {}, fallback: {}, log: {}",
        detector.rules().len(),
        config.detection.fallback,
        config.storage.db_path.display()
    );

    let addr = server_config.addr;
    let state = Arc::new(AppState::new(server_config, detector, log));
    let app = create_router(state);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok::<_, anyhow::Error>(())
    })
}

fn cmd_stats(db: &std::path::Path, tail: Option<usize>, json_output: bool) -> anyhow::Result<()> {
    let log = QueryLog::open(db)?;
    let snapshot = log.stats()?;

    if json_output {
        let output = match tail {
            Some(n) => serde_json::json!({
                "stats": snapshot,
                "recent": log.recent(n)?,
            }),
            None => serde_json::json!(snapshot),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Decision log: {}", db.display());
    println!("  Total:    {}", snapshot.total);
    println!("  Safe:     {}", snapshot.safe);
    println!("  Attacks:  {}", snapshot.attacks);

    if let Some(n) = tail {
        let entries = log.recent(n)?;
        println!();
        println!("{:<6} {:<6} {:<22} {:<20} Query", "ID", "Label", "Reason", "Timestamp");
        println!("{}", "-".repeat(90));
        for entry in entries {
            println!(
                "{:<6} {:<6} {:<22} {:<20} {}",
                entry.id,
                entry.status,
                entry.reason.as_deref().unwrap_or("-"),
                entry.timestamp,
                entry.query
            );
        }
    }

    Ok(())
}

fn cmd_rules(rules: Option<PathBuf>, json_output: bool) -> anyhow::Result<()> {
    let rule_set = load_rules(rules)?;

    if json_output {
        let output: Vec<_> = rule_set
            .iter()
            .map(|rule| {
                serde_json::json!({
                    "id": rule.id,
                    "pattern": rule.pattern,
                    "description": rule.description,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Active Rules ({}):", rule_set.len());
    println!();
    println!("{:<22} Pattern", "ID");
    println!("{}", "-".repeat(72));
    for rule in rule_set.iter() {
        println!("{:<22} {}", rule.id, rule.pattern);
    }

    Ok(())
}

// Helper functions

fn load_rules(path: Option<PathBuf>) -> anyhow::Result<RuleSet> {
    match path {
        Some(path) => Ok(RuleSet::from_file(&path)?),
        None => Ok(RuleSet::canonical()),
    }
}

fn read_input(input: Option<String>, file: Option<PathBuf>) -> anyhow::Result<String> {
    if let Some(path) = file {
        Ok(std::fs::read_to_string(path)?)
    } else if let Some(s) = input {
        if s == "-" {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        } else {
            Ok(s)
        }
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    }
}
