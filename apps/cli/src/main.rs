use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use goalcraft_core_sdk::{
    config::AppConfig,
    llm::CompletionClient,
    prompts::{self, SummaryReply},
    server, telemetry,
};

/**
 * \brief CLI 程序入口：启动服务或直接调用一次上游。
 */
#[derive(Parser, Debug)]
#[command(name = "goalcraft", version, about = "GoalCraft goal assistant backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief 启动 HTTP 服务。
     * \param addr 监听地址，缺省读取 GOALCRAFT_ADDR
     */
    Serve {
        #[arg(long)]
        addr: Option<String>,
    },

    /**
     * \brief 改写一段文本并打印结果。
     */
    Paraphrase {
        #[arg(long)]
        goal: String,
    },

    /**
     * \brief 用通俗语言概括目标。
     */
    Summarize {
        #[arg(long)]
        goal: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("load configuration failed")?;
    telemetry::init(config.telemetry_enabled, config.log_dir.clone());

    match cli.command {
        Commands::Serve { addr } => {
            if let Some(addr) = addr {
                config.addr = addr;
            }
            server::run(config).await?;
        }
        Commands::Paraphrase { goal } => {
            let goal = non_empty(&goal)?;
            let client = CompletionClient::new(config.upstream).context("build client failed")?;
            let (messages, options) = prompts::paraphrase(goal);
            telemetry::log_event("cli.paraphrase", &format!("goal_len={}", goal.len()));
            let result = client
                .chat_once(&messages, options)
                .await
                .context("paraphrase request failed")?;
            println!("{}", result);
        }
        Commands::Summarize { goal } => {
            let goal = non_empty(&goal)?;
            let client = CompletionClient::new(config.upstream).context("build client failed")?;
            let (messages, options) = prompts::summarize_goal(goal);
            telemetry::log_event("cli.summarize", &format!("goal_len={}", goal.len()));
            let reply = client
                .chat_once(&messages, options)
                .await
                .context("summarize request failed")?;
            println!("{}", summary_text(&reply)?);
        }
    }

    Ok(())
}

fn non_empty(goal: &str) -> Result<&str> {
    let trimmed = goal.trim();
    if trimmed.is_empty() {
        bail!("goal must not be empty");
    }
    Ok(trimmed)
}

fn summary_text(reply: &str) -> Result<String> {
    match prompts::parse_summary(reply) {
        Some(SummaryReply::Summary(summary)) => Ok(summary),
        Some(SummaryReply::Unclear) => bail!("goal is too unclear to summarize"),
        None => bail!("unexpected reply from model: {}", reply),
    }
}
