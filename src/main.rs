use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use menu_agent::agent::{Agent, AgentReply, PrintingCallbackHandler, PrintingConfig};
use menu_agent::config::AppConfig;
use menu_agent::evaluation::{
    default_dataset, default_item_evaluators, default_run_evaluators, judge_rubrics,
    run_experiment, LlmJudge, DEFAULT_THRESHOLD,
};
use menu_agent::llm::OpenAiCompatibleProvider;
use menu_agent::telemetry::init_logging;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

const DEMO_QUERY: &str = "How much is a Big Mac and please order one.";

#[derive(Parser)]
#[command(name = "menu-agent")]
#[command(author, version, about = "Burger shop assistant backed by a tool-calling LLM", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// TOML config file (defaults to $MENU_AGENT_CONFIG, then ./menu-agent.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print tool activity and run statistics to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the assistant one question (the default command)
    Ask {
        /// What to ask; defaults to the demo query
        query: Option<String>,
    },
    /// Run the regression dataset and score the replies
    Eval {
        /// Also grade the rubric cases with an LLM judge
        #[arg(long)]
        judge: bool,
    },
    /// Print the menu records
    Menu,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Ask { query: None });

    if let Commands::Menu = command {
        let config = AppConfig::load_unchecked(cli.config.as_deref())?;
        for record in &config.knowledge.records {
            println!("{}", record);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let config = AppConfig::load(cli.config.as_deref())?;
    let _log_guard = init_logging(config.logging.clone())?;

    let mut agent = Agent::from_config(&config)
        .await
        .context("Failed to build the agent")?;
    if cli.verbose {
        agent.add_callback_handler(Arc::new(PrintingCallbackHandler::new(
            PrintingConfig::verbose(),
        )));
    }

    match command {
        Commands::Ask { query } => {
            let query = query.unwrap_or_else(|| DEMO_QUERY.to_string());
            let reply = agent.respond(&query).await?;
            print!("{}", render_answer(&reply));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Eval { judge } => run_eval(&agent, &config, judge).await,
        Commands::Menu => Ok(ExitCode::SUCCESS),
    }
}

/// `Agent:` line, plus a `Trace ID:` line only when a trace was opened
fn render_answer(reply: &AgentReply) -> String {
    let mut out = format!("Agent: {}\n", reply.text);
    if let Some(trace_id) = &reply.trace_id {
        out.push_str(&format!("Trace ID: {}\n", trace_id));
    }
    out
}

async fn run_eval(agent: &Agent, config: &AppConfig, with_judge: bool) -> Result<ExitCode> {
    let dataset = default_dataset();
    let result = run_experiment(
        "Burger Agent Test Suite",
        &dataset,
        agent,
        &default_item_evaluators(),
        &default_run_evaluators(),
        agent.observability(),
    )
    .await;

    println!("{}", "=".repeat(60));
    println!("EXPERIMENT RESULTS: {}", result.name);
    println!("{}", "=".repeat(60));
    for (i, item) in result.item_results.iter().enumerate() {
        println!("\nTest {}: {}", i + 1, item.item.label());
        println!("   Input: {}", item.item.input);
        match (&item.output, &item.error) {
            (Some(output), _) => println!("   Output: {}", output),
            (None, Some(error)) => println!("   Error: {}", error),
            (None, None) => println!("   Output: none"),
        }
        for evaluation in &item.evaluations {
            let mark = match evaluation.value {
                Some(v) if v >= 1.0 => "PASS",
                Some(_) => "FAIL",
                None => "N/A ",
            };
            println!("   [{}] {}: {}", mark, evaluation.name, evaluation.comment);
        }
    }

    println!();
    for evaluation in &result.run_evaluations {
        match evaluation.value {
            Some(value) => println!("{}: {:.2}% - {}", evaluation.name, value * 100.0, evaluation.comment),
            None => println!("{}: N/A", evaluation.name),
        }
    }

    let mut passed = result
        .average_score()
        .is_some_and(|average| average >= DEFAULT_THRESHOLD);

    if with_judge {
        let provider = OpenAiCompatibleProvider::new(&config.provider.base_url, config.api_key()?)?
            .with_retry_config(config.provider.retry_config());
        let judge = LlmJudge::with_config(Arc::new(provider), config.provider.chat_config());

        println!("\nJUDGE RESULTS");
        for rubric in judge_rubrics() {
            let reply = agent.respond(&rubric.input).await?;
            let verdict = judge.evaluate(&rubric, &reply.text).await?;
            println!(
                "   [{}] {} ({:.2}): {}",
                if verdict.passed { "PASS" } else { "FAIL" },
                verdict.name,
                verdict.score,
                verdict.reason
            );
            passed &= verdict.passed;
        }
    }

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
