use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use wordrank::{AppState, DEFAULT_CORS_ORIGIN};
use wordrank_core::{AnalyzeRequest, RankedWord};
use wordrank_local::{AnalyzeOptions, Analyzer, PlaywrightRenderer};

#[derive(Parser, Debug)]
#[command(name = "wordrank")]
#[command(about = "Most frequent visible words on a rendered web page", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve `POST /analyze` over HTTP.
    Serve(ServeCmd),
    /// Render one URL and print its top words.
    Analyze(AnalyzeCmd),
    /// Rank words of local text (file or stdin) without rendering anything.
    Rank(RankCmd),
    /// Check that Node.js and Playwright can be found (json).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct ServeCmd {
    /// Address to listen on.
    #[arg(long, env = "WORDRANK_BIND", default_value = "127.0.0.1:5000")]
    bind: String,
    /// Single origin allowed by CORS.
    #[arg(long, env = "WORDRANK_CORS_ORIGIN", default_value = DEFAULT_CORS_ORIGIN)]
    cors_origin: String,
    /// Navigation timeout per request (ms).
    #[arg(long, env = "WORDRANK_TIMEOUT_MS", default_value_t = 30_000)]
    timeout_ms: u64,
}

#[derive(clap::Args, Debug)]
struct AnalyzeCmd {
    #[arg(long)]
    url: String,
    /// How many words to return.
    #[arg(long, allow_negative_numbers = true)]
    n: i64,
    /// Extra stop word (repeatable, or comma-separated).
    #[arg(long = "stop-word", value_delimiter = ',')]
    stop_words: Vec<String>,
    /// Navigation timeout (ms).
    #[arg(long, env = "WORDRANK_TIMEOUT_MS", default_value_t = 30_000)]
    timeout_ms: u64,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct RankCmd {
    /// Text file to read (default: stdin).
    #[arg(long)]
    file: Option<std::path::PathBuf>,
    #[arg(long, allow_negative_numbers = true)]
    n: i64,
    #[arg(long = "stop-word", value_delimiter = ',')]
    stop_words: Vec<String>,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

fn print_words(words: &[RankedWord], output: &str) -> Result<()> {
    match output.to_ascii_lowercase().as_str() {
        "text" => {
            for w in words {
                println!("{}\t{}", w.count, w.word);
            }
        }
        _ => println!("{}", serde_json::to_string(words)?),
    }
    Ok(())
}

fn analyzer(timeout_ms: u64) -> Analyzer {
    let opts = AnalyzeOptions::default().with_navigation_timeout(Duration::from_millis(timeout_ms));
    Analyzer::new(Arc::new(PlaywrightRenderer::from_env()), opts)
}

/// Opt-in `KEY=VALUE` file (`WORDRANK_ENV_FILE`); never overrides the process env.
fn load_env_file() {
    let Some(p) = std::env::var("WORDRANK_ENV_FILE")
        .ok()
        .filter(|p| !p.trim().is_empty())
    else {
        return;
    };
    let Ok(txt) = std::fs::read_to_string(p.trim()) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        if k.is_empty() || std::env::var_os(k).is_some() {
            continue;
        }
        std::env::set_var(k, v.trim());
    }
}

fn doctor_report() -> serde_json::Value {
    let t0 = std::time::Instant::now();
    let renderer = PlaywrightRenderer::from_env();
    let cfg = renderer.config();
    let node = std::process::Command::new(&cfg.node_bin)
        .arg("--version")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string());
    let playwright = node.is_some() && {
        let mut cmd = std::process::Command::new(&cfg.node_bin);
        if let Some(np) = &cfg.node_path {
            cmd.env("NODE_PATH", np);
        }
        cmd.args(["-e", "require.resolve('playwright')"])
            .output()
            .is_ok_and(|o| o.status.success())
    };
    let hint = if cfg.disabled {
        "Rendering is disabled by WORDRANK_RENDER_DISABLE."
    } else if node.is_none() {
        "Install Node.js or point WORDRANK_NODE at a node binary."
    } else if !playwright {
        "Install Playwright: `npm i -g playwright` then `npx playwright install chromium`."
    } else {
        ""
    };
    serde_json::json!({
        "schema_version": 1,
        "kind": "doctor",
        "name": "wordrank",
        "version": env!("CARGO_PKG_VERSION"),
        "ok": !cfg.disabled && node.is_some() && playwright,
        "render": {
            "disabled": cfg.disabled,
            "node_bin": cfg.node_bin,
            "node_version": node,
            "node_path_set": cfg.node_path.is_some(),
            "playwright_resolvable": playwright,
        },
        "hint": hint,
        "elapsed_ms": t0.elapsed().as_millis() as u64,
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    load_env_file();
    wordrank::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            let cors = wordrank::cors_layer(&args.cors_origin)?;
            let state = AppState::new(analyzer(args.timeout_ms));
            wordrank::serve(&args.bind, state, cors).await?;
        }
        Commands::Analyze(args) => {
            let req = AnalyzeRequest {
                url: args.url,
                n: args.n,
                stop_words: args.stop_words,
            };
            match analyzer(args.timeout_ms).analyze(&req).await {
                Ok(words) => print_words(&words, &args.output)?,
                Err(e) => {
                    tracing::error!(url = %req.url, error = %e, "analyze failed");
                    let (status, message) = wordrank::error_status(&e);
                    println!("{}", serde_json::json!({ "error": message }));
                    return Ok(if status.is_client_error() {
                        ExitCode::from(2)
                    } else {
                        ExitCode::FAILURE
                    });
                }
            }
        }
        Commands::Rank(args) => {
            let text = match &args.file {
                Some(p) => std::fs::read_to_string(p)
                    .with_context(|| format!("read {}", p.display()))?,
                None => {
                    let mut s = String::new();
                    std::io::stdin().read_to_string(&mut s)?;
                    s
                }
            };
            let n = usize::try_from(args.n).unwrap_or(0);
            let words = wordrank_local::analyze_text(&text, n, &args.stop_words);
            print_words(&words, &args.output)?;
        }
        Commands::Doctor(args) => {
            let v = doctor_report();
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!(
                    "wordrank doctor: ok={} {}",
                    v["ok"],
                    v["hint"].as_str().unwrap_or("")
                ),
                _ => println!("{v}"),
            }
        }
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "wordrank",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("wordrank {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{v}"),
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
