use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sessionflow::backend::OllamaBackend;
use sessionflow::catalog::therapy_definition;
use sessionflow::config::{BackendConfig, DEFAULT_ENDPOINT, DEFAULT_MODEL};
use sessionflow::contracts::ResponsePolicy;
use sessionflow::events::LoggingEventSink;
use sessionflow::observability::{init_tracing, LogFormat};
use sessionflow::pipeline::{PipelineDefinition, PipelineRunner, StageGraph};
use sessionflow::prompt::render_from_store;
use sessionflow::storage::ResultStore;
use sessionflow::transcript::Transcript;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "sessionflow")]
#[command(about = "Annotate a therapy session transcript with a pipeline of LLM stages", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Args)]
struct PipelineArgs {
    /// Pipeline definition file (JSON). Defaults to the built-in therapy pipeline.
    #[arg(long)]
    pipeline: Option<PathBuf>,
}

impl PipelineArgs {
    fn graph(&self) -> Result<StageGraph> {
        let definition = match &self.pipeline {
            Some(path) => PipelineDefinition::from_json_file(path)
                .with_context(|| format!("reading pipeline definition {}", path.display()))?,
            None => therapy_definition(),
        };
        Ok(definition.build()?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run every stage and print the final result.
    Run {
        #[arg(long)]
        transcript: PathBuf,

        /// Directory stage files are written to.
        #[arg(short = 'o', long, default_value = ".")]
        output_dir: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,

        #[arg(long, env = "SESSIONFLOW_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
        endpoint: String,

        #[arg(long, env = "SESSIONFLOW_MODEL", default_value = DEFAULT_MODEL)]
        model: String,

        /// How model responses are checked before they are written.
        #[arg(long, default_value_t = ResponsePolicy::Validate)]
        policy: ResponsePolicy,

        #[arg(long)]
        timeout_secs: Option<u64>,

        #[arg(long)]
        temperature: Option<f32>,
    },
    /// Print the execution plan as JSON.
    Plan {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Print the prompt a stage would receive, without calling a model.
    Render {
        #[arg(long)]
        transcript: PathBuf,

        #[arg(long)]
        stage: String,

        /// Directory holding the dependency results from an earlier run.
        #[arg(long, default_value = ".")]
        context_dir: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.log_json { LogFormat::Json } else { LogFormat::Text };
    init_tracing(format).map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    match cli.cmd {
        Commands::Run {
            transcript,
            output_dir,
            pipeline,
            endpoint,
            model,
            policy,
            timeout_secs,
            temperature,
        } => {
            let mut config = BackendConfig::new().with_endpoint(endpoint).with_model(model);
            if let Some(seconds) = timeout_secs {
                config = config.with_timeout_seconds(seconds);
            }
            if let Some(t) = temperature {
                config = config.with_temperature(t);
            }
            config.validate()?;

            let graph = pipeline.graph()?;
            let backend = OllamaBackend::new(config)?;
            let runner = PipelineRunner::new(graph, Arc::new(backend), ResultStore::new(output_dir))
                .with_policy(policy)
                .with_event_sink(Arc::new(LoggingEventSink::debug()));

            let outcome = runner.run_from_path(&transcript).await?;
            if let Some(result) = outcome.final_result() {
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{}", result.content)?;
            }
        }
        Commands::Plan { pipeline } => {
            let plan = pipeline.graph()?.plan();
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Commands::Render {
            transcript,
            stage,
            context_dir,
            pipeline,
        } => {
            let graph = pipeline.graph()?;
            let transcript = Transcript::load(&transcript)?;
            let store = ResultStore::new(context_dir);
            println!("{}", render_from_store(&graph, &stage, &transcript, &store)?);
        }
    }

    Ok(())
}
