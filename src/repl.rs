//! Interactive console and the connection probe

use crate::agent::ReactAgent;
use anyhow::Result;
use chrono::{DateTime, Local};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, info};

/// Asked when the user just presses enter
pub const DEMO_QUESTION: &str = "List all indices in the Elasticsearch cluster";
/// Asked once by the probe
pub const TEST_QUESTION: &str = "What is the cluster health status?";

const PROMPT: &str = "Enter your query: ";
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

fn is_exit(input: &str) -> bool {
    matches!(input.to_ascii_lowercase().as_str(), "quit" | "exit" | "stop")
}

/// Interactive loop on stdin/stdout
pub async fn run_repl(agent: &ReactAgent) -> Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    run_repl_with(agent, stdin, std::io::stdout()).await
}

/// Interactive loop over any line source and sink
pub async fn run_repl_with<R, W>(agent: &ReactAgent, input: R, mut out: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(out, "Elasticsearch log agent {}", crate::VERSION)?;
    writeln!(
        out,
        "Tools: {}. Type quit, exit or stop to leave; press enter for a demo query.",
        agent.tools().names().join(", ")
    )?;

    let mut lines = input.lines();
    loop {
        write!(out, "\n{}", PROMPT)?;
        out.flush()?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let trimmed = line.trim();
        if is_exit(trimmed) {
            break;
        }
        let question = if trimmed.is_empty() {
            writeln!(out, "Running demo query: {}", DEMO_QUESTION)?;
            DEMO_QUESTION
        } else {
            trimmed
        };

        match agent.run(question).await {
            Ok(answer) => writeln!(out, "\nResponse: {}", answer)?,
            Err(e) => writeln!(out, "\nError: {:#}", e)?,
        }
    }

    writeln!(out, "Goodbye!")?;
    Ok(())
}

/// Console line printed by the probe's heartbeat
pub fn heartbeat_line(now: DateTime<Local>) -> String {
    format!(
        "[{}] Agent heartbeat - ready for queries",
        now.format("%Y-%m-%d %H:%M:%S")
    )
}

/// Run the test question once, then print a heartbeat until Ctrl-C
pub async fn run_probe(agent: &ReactAgent) -> Result<()> {
    info!("Testing agent with: {}", TEST_QUESTION);
    match agent.run(TEST_QUESTION).await {
        Ok(answer) => {
            println!("Agent connection test successful");
            println!("Response: {}", answer);
        }
        Err(e) => {
            error!("Agent connection test failed: {:#}", e);
            println!("Agent connection test failed: {:#}", e);
        }
    }

    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => println!("{}", heartbeat_line(Local::now())),
            _ = tokio::signal::ctrl_c() => {
                info!("Probe stopped");
                return Ok(());
            }
        }
    }
}
