use std::env;
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::sync::Arc;

use contracts::SessionConfig;
use tankard_api::{serve, GameSession, OfflineBackend, OllamaClient, SessionManager};
use tankard_core::content::{builtin_content, load_content};
use tankard_core::llm::LanguageBackend;
use tracing_subscriber::EnvFilter;

fn print_usage() {
    println!("tankard <command>");
    println!("commands:");
    println!("  play [session_id]");
    println!("    interactive session; 'quit' to leave");
    println!("  serve [addr]");
    println!("    default addr: 127.0.0.1:8080");
    println!("  demo <seed> [steps]");
    println!("    runs a deterministic scripted session and prints its events");
    println!("environment:");
    println!("  TANKARD_OFFLINE=1        skip the Ollama backend entirely");
    println!("  TANKARD_SQLITE_PATH      sqlite file (default tankard_sessions.sqlite)");
    println!("  TANKARD_CONTENT_PATH     content pack JSON (default built-in tavern)");
    println!("  OLLAMA_BASE_URL / OLLAMA_MODEL");
}

fn parse_u64(value: Option<&String>, label: &str) -> Result<u64, String> {
    let raw = value.ok_or_else(|| format!("missing {label}"))?;
    raw.parse::<u64>()
        .map_err(|_| format!("invalid {label}: {raw}"))
}

fn parse_socket_addr(value: Option<&String>) -> Result<SocketAddr, String> {
    let raw = value.map(String::as_str).unwrap_or("127.0.0.1:8080");
    raw.parse::<SocketAddr>()
        .map_err(|_| format!("invalid addr: {raw}"))
}

fn default_sqlite_path() -> String {
    env::var("TANKARD_SQLITE_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "tankard_sessions.sqlite".to_string())
}

fn backend_from_env(timeout_secs: u64) -> Arc<dyn LanguageBackend> {
    if env::var("TANKARD_OFFLINE").is_ok() {
        Arc::new(OfflineBackend)
    } else {
        Arc::new(OllamaClient::from_env(timeout_secs))
    }
}

fn content_from_env() -> contracts::ContentPack {
    match env::var("TANKARD_CONTENT_PATH") {
        Ok(path) if !path.trim().is_empty() => match load_content(&path) {
            Ok(pack) => pack,
            Err(err) => {
                eprintln!("warning: failed to load content from {path}: {err}");
                builtin_content()
            }
        },
        _ => builtin_content(),
    }
}

async fn run_repl(session_id: String) {
    let config = SessionConfig {
        session_id,
        ..SessionConfig::default()
    };
    let content = content_from_env();
    let mut session = GameSession::new(
        config.clone(),
        &content,
        backend_from_env(config.llm_timeout_secs),
    );
    if let Err(err) = session.attach_sqlite_store(default_sqlite_path()) {
        eprintln!("warning: sqlite unavailable, playing in memory: {err}");
    }

    println!("The Living Rusted Tankard — type 'help' for commands, 'quit' to leave.\n");
    let opening = session.process_input("look").await;
    println!("{}\n", opening.narrative);

    let stdin = io::stdin();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                eprintln!("input error: {err}");
                break;
            }
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "quit" | "exit") {
            println!("The tavern door swings shut behind you.");
            break;
        }

        let outcome = session.process_input(line).await;
        println!("{}\n", outcome.narrative);
    }
}

fn run_demo(args: &[String]) -> Result<(), String> {
    let seed = parse_u64(args.get(2), "seed")?;
    let steps = args
        .get(3)
        .map(|value| {
            value
                .parse::<usize>()
                .map_err(|_| format!("invalid steps: {value}"))
        })
        .transpose()?
        .unwrap_or(12);

    const SCRIPT: [&str; 8] = [
        "look",
        "buy bread",
        "talk grim",
        "work wash_dishes",
        "wait 6",
        "npcs",
        "gamble 3",
        "status",
    ];

    let config = SessionConfig {
        session_id: format!("demo_{seed}"),
        seed,
        ..SessionConfig::default()
    };
    let mut state = tankard_core::state::GameState::new(config, &content_from_env());

    for step in 0..steps {
        let raw = SCRIPT[step % SCRIPT.len()];
        let outcome = state.process_command(raw);
        println!("> {raw}");
        println!("{}\n", outcome.narrative);
    }

    println!("--- event log ---");
    for event in state.events() {
        println!(
            "#{:04} [{}] {:?}",
            event.sequence, event.created_at, event.event_type
        );
    }
    println!(
        "--- {} events, {} gold, {} ---",
        state.event_log().len(),
        state.player().gold,
        contracts::clock_stamp(state.now()),
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    match command {
        Some("play") => {
            let session_id = args
                .get(2)
                .cloned()
                .unwrap_or_else(|| "session_local_001".to_string());
            run_repl(session_id).await;
        }
        Some("serve") => match parse_socket_addr(args.get(2)) {
            Ok(addr) => {
                let config = SessionConfig::default();
                let manager =
                    SessionManager::new(content_from_env(), backend_from_env(config.llm_timeout_secs))
                        .with_sqlite_path(default_sqlite_path());
                println!("serving api on http://{addr}");
                if let Err(err) = serve(addr, manager).await {
                    eprintln!("server error: {err}");
                    std::process::exit(1);
                }
            }
            Err(err) => {
                eprintln!("error: {err}");
                print_usage();
                std::process::exit(2);
            }
        },
        Some("demo") => {
            if let Err(err) = run_demo(&args) {
                eprintln!("error: {err}");
                print_usage();
                std::process::exit(2);
            }
        }
        _ => {
            print_usage();
        }
    }
}
