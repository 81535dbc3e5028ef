// crates/swarmcli/src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use swarmagents::{demo, ScriptedInvoker};
use swarmcore::{ChatMessage, RunEvent};
use swarmruntime::WorkflowEngine;

const DEFAULT_PROMPT: &str =
    "Find software engineering jobs and matching CVs for Python developers with 3+ years experience.";

#[derive(Parser)]
#[command(name = "swarm")]
#[command(about = "Concurrent agent workflow CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the job-search demo workflow and stream its events
    Run {
        /// User query dispatched to both agents
        #[arg(short, long, default_value = DEFAULT_PROMPT)]
        prompt: String,

        /// Simulated agent latency in milliseconds
        #[arg(long, default_value_t = 200)]
        delay_ms: u64,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            prompt,
            delay_ms,
            verbose,
        } => {
            if verbose {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::DEBUG)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::INFO)
                    .init();
            }

            run_demo(prompt, delay_ms).await?;
        }
    }

    Ok(())
}

async fn run_demo(prompt: String, delay_ms: u64) -> Result<()> {
    let delay = Duration::from_millis(delay_ms);
    let job_invoker = ScriptedInvoker::new(
        "1. Senior Python Engineer at Acme - 3+ years Python, distributed systems.\n\
         2. Backend Developer at Initech - Python, PostgreSQL, remote friendly.",
    )
    .with_delay(delay);
    let cv_invoker = ScriptedInvoker::new(
        "1. Dana R. - 5 years Python, Django and asyncio, open-source contributor.\n\
         2. Kim T. - 4 years Python, data pipelines, strong testing background.",
    )
    .with_delay(delay);

    let workflow = Arc::new(demo::job_search_workflow(
        Arc::new(job_invoker),
        Arc::new(cv_invoker),
    )?);

    println!("\n# User: '{}'", prompt);

    let engine = WorkflowEngine::new();
    let mut stream = engine.run_stream(workflow, vec![ChatMessage::user(&prompt)]);

    let mut failed = false;
    while let Some(event) = stream.next_event().await {
        match event {
            RunEvent::RunStarted { run_id, .. } => {
                println!("▶️  Run started: {}", run_id);
            }
            RunEvent::NodeUpdate { node, text, .. } => {
                println!("  ⚡ [{}]\n{}", node, text);
            }
            RunEvent::Output { text, .. } => {
                println!("\n📤 Output:\n{}", text);
            }
            RunEvent::RunFailed { error, .. } => {
                failed = true;
                println!("  ❌ Run failed: {}", error);
            }
        }
    }

    if failed {
        anyhow::bail!("run failed");
    }
    println!("\n--- All tasks completed successfully ---");
    Ok(())
}
