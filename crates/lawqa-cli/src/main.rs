use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lawqa_ai::{AiError, CompletionService, HttpCompletion, LlmNameNormalizer, MentionRecognizer};
use lawqa_core::settings::{BALANCE_DEPLETION_EXIT_CODE, TIME_LIMIT_EXIT_CODE};
use lawqa_core::{ParamKind, ParamValue, Settings, ToolArgs};
use lawqa_host::{HttpSandboxProvider, QaPipeline, Services, ToolRegistry};
use lawqa_resolve::EntityResolver;
use lawqa_store::{HttpRegistry, StoreError};

mod batch;
mod runner;

use batch::StateFile;
use runner::BatchEnd;

#[derive(Parser)]
#[command(name = "lawqa", version, about = "Legal registry question answering")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy a question file with every answer blanked.
    Prepare { input: PathBuf, output: PathBuf },
    /// Answer every pending record of a state file in place.
    Run {
        state: PathBuf,
        #[arg(long, default_value_t = 4)]
        max_concurrency: usize,
        /// Stop the batch after this many seconds; 0 disables the limit.
        #[arg(long, default_value_t = 55 * 60)]
        time_limit_secs: u64,
        #[command(flatten)]
        services: ServiceArgs,
        #[command(flatten)]
        tuning: TuningArgs,
    },
    /// Print every record with its answer.
    List { state: PathBuf },
    /// Call one registry tool; without a name, print the catalogue.
    Tool {
        name: Option<String>,
        /// Value of the tool's `value` parameter.
        value: Option<String>,
        /// Other parameters as `key=value`; non-text values are JSON.
        #[arg(long = "arg", value_parser = parse_pair)]
        args: Vec<(String, String)>,
        #[command(flatten)]
        registry: RegistryArgs,
    },
}

#[derive(Args)]
struct RegistryArgs {
    #[arg(long, env = "LAWQA_REGISTRY_URL")]
    registry_url: String,
    #[arg(long, env = "TEAM_TOKEN", hide_env_values = true)]
    team_token: String,
}

#[derive(Args)]
struct ServiceArgs {
    #[command(flatten)]
    registry: RegistryArgs,
    #[arg(long, env = "LAWQA_LLM_URL")]
    llm_url: String,
    #[arg(long, env = "LAWQA_LLM_API_KEY", hide_env_values = true)]
    llm_api_key: String,
    #[arg(long, env = "LAWQA_LLM_MODEL")]
    llm_model: String,
    #[arg(long, env = "LAWQA_SANDBOX_URL")]
    sandbox_url: String,
}

#[derive(Args)]
struct TuningArgs {
    #[arg(long, default_value_t = 280)]
    question_budget_secs: u64,
    #[arg(long, default_value_t = 280)]
    fallback_budget_secs: u64,
    #[arg(long, default_value_t = 3000)]
    stage_delay_ms: u64,
    #[arg(long, default_value_t = 4)]
    max_execution_attempts: u32,
    #[arg(long, default_value_t = 3)]
    synthesis_attempts: u32,
    #[arg(long, default_value_t = 3)]
    service_attempts: u32,
    #[arg(long, default_value_t = 1000)]
    service_base_delay_ms: u64,
    #[arg(long, default_value_t = 3072)]
    code_max_tokens: u32,
    #[arg(long, default_value_t = 5)]
    max_name_variants: usize,
}

impl From<TuningArgs> for Settings {
    fn from(t: TuningArgs) -> Self {
        Settings {
            question_budget: Duration::from_secs(t.question_budget_secs),
            fallback_budget: Duration::from_secs(t.fallback_budget_secs),
            stage_delay: Duration::from_millis(t.stage_delay_ms),
            max_execution_attempts: t.max_execution_attempts,
            synthesis_attempts: t.synthesis_attempts,
            service_attempts: t.service_attempts,
            service_base_delay: Duration::from_millis(t.service_base_delay_ms),
            code_max_tokens: t.code_max_tokens,
            max_name_variants: t.max_name_variants,
        }
    }
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{s}`"))?;
    Ok((k.trim().to_string(), v.to_string()))
}

impl RegistryArgs {
    fn connect(self) -> Arc<HttpRegistry> {
        Arc::new(HttpRegistry::new(self.registry_url, self.team_token))
    }
}

fn build_pipeline(services: ServiceArgs, settings: Settings) -> QaPipeline {
    let completion: Arc<dyn CompletionService> = Arc::new(HttpCompletion::new(
        services.llm_url,
        services.llm_api_key,
        services.llm_model,
    ));
    let registry = services.registry.connect();
    let ai_retry = settings.service_retry(AiError::is_retryable);
    let names = LlmNameNormalizer::new(Arc::clone(&completion), ai_retry, settings.max_name_variants);
    let resolver = EntityResolver::new(
        MentionRecognizer::new(Arc::clone(&completion), ai_retry),
        Arc::clone(&registry) as _,
        Arc::new(names),
        settings.service_retry(StoreError::is_retryable),
    );
    QaPipeline::new(
        Services {
            completion,
            resolver: Arc::new(resolver),
            tools: Arc::new(ToolRegistry::new(registry)),
            sandboxes: Arc::new(HttpSandboxProvider::new(services.sandbox_url)),
        },
        settings,
    )
}

async fn run_tool(
    tools: &ToolRegistry,
    name: Option<String>,
    value: Option<String>,
    pairs: Vec<(String, String)>,
) -> anyhow::Result<()> {
    let Some(name) = name else {
        let names: Vec<&str> = tools.names().collect();
        println!("{}", tools.describe(&names));
        return Ok(());
    };
    let spec = tools
        .spec(&name)
        .with_context(|| format!("unknown tool `{name}`"))?;
    let mut args = ToolArgs::new();
    for (key, raw) in pairs {
        let kind = spec.params.iter().find(|p| p.name == key).map(|p| p.kind);
        args.insert(key, arg_value(kind, raw)?);
    }
    if let Some(value) = value {
        args.insert("value".to_string(), ParamValue::Text(value));
    }
    match tools.call(&name, &args).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(e) => {
            let (ename, evalue) = e.taxonomy();
            bail!("{ename}: {evalue}")
        }
    }
}

/// Text parameters take the raw string; every other kind is parsed as JSON.
fn arg_value(kind: Option<ParamKind>, raw: String) -> anyhow::Result<ParamValue> {
    match kind {
        Some(ParamKind::Text) | None => Ok(ParamValue::Text(raw)),
        Some(_) => {
            let json: serde_json::Value =
                serde_json::from_str(&raw).with_context(|| format!("`{raw}` is not valid JSON"))?;
            ParamValue::from_json(json).map_err(anyhow::Error::msg)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Prepare { input, output } => {
            let n = batch::prepare(&input, &output)?;
            tracing::info!(records = n, output = %output.display(), "state file prepared");
        }
        Commands::List { state } => {
            print!("{}", batch::render_list(&batch::read_records(&state)?));
        }
        Commands::Tool {
            name,
            value,
            args,
            registry,
        } => {
            let tools = ToolRegistry::new(registry.connect());
            run_tool(&tools, name, value, args).await?;
        }
        Commands::Run {
            state,
            max_concurrency,
            time_limit_secs,
            services,
            tuning,
        } => {
            if !state.exists() {
                bail!("state file {} not found; create it with `lawqa prepare`", state.display());
            }
            tracing::info!("lawqa v{}", env!("CARGO_PKG_VERSION"));
            let pipeline = Arc::new(build_pipeline(services, tuning.into()));
            let limit = (time_limit_secs > 0).then(|| Duration::from_secs(time_limit_secs));
            let end = runner::run_batch(pipeline, Arc::new(StateFile::new(state)), max_concurrency, limit)
                .await
                .context("batch run failed")?;
            match end {
                BatchEnd::Completed { .. } => {}
                BatchEnd::BalanceDepleted => std::process::exit(BALANCE_DEPLETION_EXIT_CODE),
                BatchEnd::TimeLimit => std::process::exit(TIME_LIMIT_EXIT_CODE),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn tuning_defaults_match_settings() {
        let cli = Cli::try_parse_from([
            "lawqa",
            "run",
            "state.jsonl",
            "--registry-url",
            "http://registry",
            "--team-token",
            "t",
            "--llm-url",
            "http://llm",
            "--llm-api-key",
            "k",
            "--llm-model",
            "m",
            "--sandbox-url",
            "http://sandbox",
        ])
        .unwrap();
        let Commands::Run { tuning, time_limit_secs, .. } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(time_limit_secs, 3300);
        let settings: Settings = tuning.into();
        let defaults = Settings::default();
        assert_eq!(settings.question_budget, defaults.question_budget);
        assert_eq!(settings.stage_delay, defaults.stage_delay);
        assert_eq!(settings.code_max_tokens, defaults.code_max_tokens);
    }

    #[test]
    fn tool_arguments_follow_declared_kinds() {
        assert_eq!(
            arg_value(Some(ParamKind::Text), "600151".into()).unwrap(),
            ParamValue::Text("600151".into())
        );
        assert_eq!(
            arg_value(Some(ParamKind::NumberList), "[2, 1]".into()).unwrap(),
            ParamValue::NumberList(vec![2.0, 1.0])
        );
        assert_eq!(
            arg_value(Some(ParamKind::Flag), "true".into()).unwrap(),
            ParamValue::Flag(true)
        );
        assert!(arg_value(Some(ParamKind::Number), "many".into()).is_err());
    }

    #[test]
    fn pairs_parse() {
        assert_eq!(parse_pair("city=合肥市").unwrap(), ("city".into(), "合肥市".into()));
        assert!(parse_pair("nope").is_err());
    }
}
