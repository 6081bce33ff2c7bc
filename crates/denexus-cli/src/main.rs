//! Terminal shell for the DeNexus assistant.

use std::fmt::Display;
use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use denexus_core::{
    app_data_dir, config_path, get_index, load_documents, rebuild_index, save_config,
    scan_tables, status, Answer, ChatSession, Config, OllamaEmbedder,
};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "denexus")]
#[command(about = "DeNexus: cybersecurity incident-report assistant")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show backend status (for dev).
    Status,
    /// Show where DeNexus keeps its config file.
    DataDir,
    /// Print the effective configuration.
    Config {
        /// Write the effective configuration to the config file.
        #[arg(long)]
        init: bool,
    },
    /// List the source tables found in the data directory.
    Tables,
    /// Load the persisted index, or build it if missing.
    Index {
        /// Discard any persisted index and rebuild from the tables.
        #[arg(long)]
        rebuild: bool,
    },
    /// Ask a single question.
    Ask {
        #[arg(value_name = "QUESTION")]
        question: String,
        /// Also print the retrieved passages.
        #[arg(long)]
        show_context: bool,
        /// Print the answer and its context as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Interactive chat. `/history` shows the conversation, `/exit` quits.
    Chat {
        /// Delay between words when printing answers, in milliseconds.
        #[arg(long, default_value_t = 50)]
        word_delay_ms: u64,
    },
}

#[derive(Serialize)]
struct AskOutput<'a> {
    question: &'a str,
    model: &'a str,
    top_k: usize,
    #[serde(flatten)]
    answer: &'a Answer,
}

/// One displayed message of an interactive chat.
struct ChatTurn {
    role: &'static str,
    content: String,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn fail(e: impl Display) -> ExitCode {
    eprintln!("Error: {}", e);
    ExitCode::FAILURE
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::Status);
    if let Commands::Status = command {
        println!("DeNexus backend");
        println!("  core: {}", status());
        return ExitCode::SUCCESS;
    }
    if let Commands::DataDir = command {
        return match app_data_dir() {
            Some(p) => {
                println!("{}", p.display());
                ExitCode::SUCCESS
            }
            None => fail("could not determine app data directory"),
        };
    }

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    match command {
        Commands::Status | Commands::DataDir => ExitCode::SUCCESS,
        Commands::Config { init } => show_config(&config, init),
        Commands::Tables => list_tables(&config),
        Commands::Index { rebuild } => index(&config, rebuild).await,
        Commands::Ask {
            question,
            show_context,
            json,
        } => ask(&config, &question, show_context, json).await,
        Commands::Chat { word_delay_ms } => {
            chat(&config, Duration::from_millis(word_delay_ms)).await
        }
    }
}

fn show_config(config: &Config, init: bool) -> ExitCode {
    match serde_json::to_string_pretty(config) {
        Ok(s) => println!("{}", s),
        Err(e) => return fail(e),
    }
    println!(
        "api key: {}",
        if config.api_key.is_some() { "set" } else { "not set" }
    );
    if init {
        match save_config(config) {
            Ok(path) => println!("wrote {}", path.display()),
            Err(e) => return fail(e),
        }
    } else if let Some(path) = config_path() {
        println!("config file: {}", path.display());
    }
    ExitCode::SUCCESS
}

fn list_tables(config: &Config) -> ExitCode {
    let found = match scan_tables(&config.data_dir) {
        Ok(t) => t,
        Err(e) => return fail(e),
    };
    println!("Tables under {}", config.data_dir.display());
    for source in &config.sources {
        let mark = if found.iter().any(|t| t.source == source.name) {
            "ok     "
        } else {
            "missing"
        };
        println!("  {}  {}  [{}]", mark, source.name, source.columns.join(", "));
    }
    for table in found
        .iter()
        .filter(|t| !config.sources.iter().any(|s| s.name == t.source))
    {
        println!("  unused   {}  {}", table.source, table.path.display());
    }
    ExitCode::SUCCESS
}

async fn index(config: &Config, rebuild: bool) -> ExitCode {
    let embedder = match OllamaEmbedder::from_url(&config.ollama_url) {
        Ok(e) => e.with_embed_model(config.model_name.clone()),
        Err(e) => return fail(e),
    };
    let documents = match load_documents(&config.sources, &config.data_dir) {
        Ok(d) => d,
        Err(e) => return fail(e),
    };
    let result = if rebuild {
        rebuild_index(&documents, &embedder, &config.index_path).await
    } else {
        get_index(&documents, &embedder, &config.index_path).await
    };
    match result {
        Ok(index) => {
            println!(
                "Index at {}: {} document(s), {} dimensions, model {}",
                config.index_path.display(),
                index.len(),
                index.dims(),
                index.embed_model()
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

async fn ask(config: &Config, question: &str, show_context: bool, json: bool) -> ExitCode {
    let session = match ChatSession::from_config(config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let answer = match session.answer_with_context(question).await {
        Ok(a) => a,
        Err(e) => return fail(e),
    };
    if json {
        let out = AskOutput {
            question,
            model: session.completion_model(),
            top_k: session.settings().top_k,
            answer: &answer,
        };
        return match serde_json::to_string_pretty(&out) {
            Ok(s) => {
                println!("{}", s);
                ExitCode::SUCCESS
            }
            Err(e) => fail(e),
        };
    }
    if show_context {
        for (i, passage) in answer.context.iter().enumerate() {
            println!("[{}] {}", i + 1, passage);
        }
        println!();
    }
    println!("{}", answer.text);
    ExitCode::SUCCESS
}

async fn chat(config: &Config, word_delay: Duration) -> ExitCode {
    let session = match ChatSession::from_config(config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    if let Err(e) = session.initialize().await {
        return fail(e);
    }
    let documents = session.index().map_or(0, |i| i.len());
    println!(
        "Chat DeNexus: {} document(s), top {} passages, embeddings {}, answers {}.",
        documents,
        session.settings().top_k,
        session.embed_model(),
        session.completion_model()
    );
    println!("Ask a question (/history, /exit).");

    let mut history: Vec<ChatTurn> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();
        let line = match lines.next_line().await {
            Ok(Some(l)) => l,
            Ok(None) => break,
            Err(e) => return fail(e),
        };
        let prompt = line.trim();
        match prompt {
            "" => continue,
            "/exit" | "/quit" => break,
            "/history" => {
                for turn in &history {
                    println!("{}: {}", turn.role, turn.content);
                }
                continue;
            }
            _ => {}
        }

        history.push(ChatTurn {
            role: "user",
            content: prompt.to_string(),
        });
        match session.answer(prompt).await {
            Ok(text) => {
                print_paced(&text, word_delay).await;
                history.push(ChatTurn {
                    role: "assistant",
                    content: text,
                });
            }
            // the session stays usable after a failed query
            Err(e) => eprintln!("Error: {}", e),
        }
    }
    ExitCode::SUCCESS
}

/// Prints `text` one word at a time. Display only; the answer is already complete.
async fn print_paced(text: &str, delay: Duration) {
    let mut stdout = std::io::stdout();
    for word in text.split_whitespace() {
        print!("{} ", word);
        stdout.flush().ok();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    println!();
}
