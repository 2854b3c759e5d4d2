mod chat;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gigi_core::{
    evaluate_cases, EmbeddingProvider, EngineConfig, EvalCase, HashEmbeddingProvider,
    IntentTable, KnowledgeBase, MatchingEngine, MiniLmEmbeddingProvider,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

pub type Engine = MatchingEngine<Box<dyn EmbeddingProvider + Send + Sync>>;

#[derive(Debug, Parser)]
#[command(name = "gigi")]
#[command(version, about = "GIGI - assistente virtual de perguntas e respostas")]
struct Cli {
    /// Knowledge base: a JSON object mapping questions to answers.
    #[arg(long, global = true, env = "GIGI_KB", default_value = "base_conhecimento.json")]
    kb: PathBuf,

    /// Intent table (JSON). The built-in Portuguese intents are used when omitted.
    #[arg(long, global = true, env = "GIGI_INTENTS")]
    intents: Option<PathBuf>,

    /// Engine settings (TOML). Missing file means defaults.
    #[arg(long, global = true, env = "GIGI_CONFIG", default_value = "gigi.toml")]
    config: PathBuf,

    /// Path to the sentence-encoder weights (.safetensors). Needs --tokenizer-path.
    #[arg(long, global = true)]
    model_path: Option<PathBuf>,

    /// Path to the tokenizer.json file. Required when --model-path is set.
    #[arg(long, global = true)]
    tokenizer_path: Option<PathBuf>,

    /// Fixed seed for reply and emoji selection.
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Interactive conversation.
    Chat,
    /// Answer a single question.
    Ask {
        #[arg(long)]
        question: String,
        /// Print the reply and where it came from as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Run evaluation cases and report the pass rate.
    Eval {
        #[arg(long)]
        cases: PathBuf,
        #[arg(long, default_value_t = 0.85)]
        min_pass_rate: f32,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

fn make_embedder(cli: &Cli) -> Result<Box<dyn EmbeddingProvider + Send + Sync>> {
    match (&cli.model_path, &cli.tokenizer_path) {
        (Some(model), Some(tokenizer)) => {
            let ext = model.extension().and_then(|e| e.to_str()).unwrap_or("");
            if ext != "safetensors" {
                bail!("unsupported model format '.{ext}' (expected .safetensors)");
            }
            eprintln!("Loading model from {} ...", model.display());
            let provider = MiniLmEmbeddingProvider::load(model, tokenizer)?;
            eprintln!("Model loaded.");
            Ok(Box::new(provider))
        }
        (None, None) => Ok(Box::new(HashEmbeddingProvider::default())),
        _ => bail!("--model-path and --tokenizer-path must both be provided"),
    }
}

fn load_intents(path: Option<&Path>) -> Result<IntentTable> {
    match path {
        Some(path) => IntentTable::from_path(path)
            .with_context(|| format!("load intents {}", path.display())),
        None => Ok(IntentTable::portuguese()),
    }
}

fn build_engine(cli: &Cli) -> Result<Engine> {
    let config = EngineConfig::load_or_default(&cli.config)
        .with_context(|| format!("load config {}", cli.config.display()))?;
    let kb = KnowledgeBase::from_path(&cli.kb)?;
    let intents = load_intents(cli.intents.as_deref())?;
    let embedder = make_embedder(cli)?;

    MatchingEngine::from_knowledge_base(embedder, &kb, intents, config)
        .context("prepare matching engine")
}

fn read_eval_cases_json(path: &Path) -> Result<Vec<EvalCase>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let cases: Vec<EvalCase> = serde_json::from_reader(file).context("parse eval cases json")?;
    Ok(cases)
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut rng = make_rng(cli.seed);

    match &cli.command {
        Commands::Chat => {
            let engine = build_engine(&cli)?;
            chat::run(&engine, &mut rng)?;
        }
        Commands::Ask { question, json } => {
            if question.trim().is_empty() {
                bail!("question must not be blank");
            }
            let engine = build_engine(&cli)?;
            let reply = engine.answer_with(question, &mut rng);

            if *json {
                println!("{}", serde_json::to_string(&reply)?);
            } else {
                println!("{reply}");
            }
        }
        Commands::Eval {
            cases,
            min_pass_rate,
        } => {
            let run_id = format!("eval-{}", chrono::Utc::now().timestamp_millis());
            let engine = build_engine(&cli)?;
            let cases = read_eval_cases_json(cases)?;
            let summary = evaluate_cases(&engine, &cases, &mut rng);

            println!(
                "run_id={} total={} passed={} failed={} pass_rate={:.4} required={:.4} meets_threshold={}",
                run_id,
                summary.total,
                summary.passed,
                summary.failed,
                summary.pass_rate,
                min_pass_rate,
                summary.meets(*min_pass_rate)
            );

            for o in &summary.outcomes {
                println!(
                    "case={} passed={} source={} latency={:.1}ms",
                    o.case_id,
                    o.passed,
                    serde_json::to_string(&o.actual)?,
                    o.latency_ms
                );
            }

            if !summary.meets(*min_pass_rate) {
                bail!(
                    "pass rate {:.4} below required {:.4}",
                    summary.pass_rate,
                    min_pass_rate
                );
            }
        }
    }

    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ask_with_defaults() {
        let cli = Cli::try_parse_from(["gigi", "ask", "--question", "oi"]).expect("parse");
        assert_eq!(cli.config, PathBuf::from("gigi.toml"));
        assert!(cli.intents.is_none());
        assert!(cli.seed.is_none());
        assert!(matches!(cli.command, Commands::Ask { json: false, .. }));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "gigi", "eval", "--cases", "c.json", "--kb", "kb.json", "--seed", "7",
        ])
        .expect("parse");
        assert_eq!(cli.kb, PathBuf::from("kb.json"));
        assert_eq!(cli.seed, Some(7));
        match cli.command {
            Commands::Eval { min_pass_rate, .. } => assert_eq!(min_pass_rate, 0.85),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn model_path_requires_tokenizer() {
        let cli = Cli::try_parse_from(["gigi", "--model-path", "m.safetensors", "chat"])
            .expect("parse");
        assert!(make_embedder(&cli).is_err());
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        use rand::Rng;
        let a: u64 = make_rng(Some(5)).gen();
        let b: u64 = make_rng(Some(5)).gen();
        assert_eq!(a, b);
    }
}
