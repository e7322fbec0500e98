use std::io::Write;

use anyhow::Result;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod client;
mod config;
mod countdown;
mod display;

use crate::{
    client::{ClientResult, ExtendOutcome, SessionClient},
    config::DisplayConfig,
    countdown::{Countdown, format_mm_ss},
    display::{
        Command, DisplayEvent, MountedTimer, parse_command, resolve_session, system_clock,
    },
};

/// Line written when the countdown finishes, for the embedding process
const ENDED_SIGNAL: &str = "TIMER_ENDED";

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the countdown
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = DisplayConfig::load(std::env::args().nth(1))?;
    let client = SessionClient::new(&config.api_base_url, config.request_timeout())?;

    info!(api = %config.api_base_url, "Resolving timer session");
    let session = match resolve_session(&client, &config.resolve()).await {
        Ok(session) => session,
        Err(e) => {
            render_error(&format!("Failed to start timer: {}", e));
            return Err(e.into());
        }
    };

    let countdown = Countdown::new(session.session_id, session.start_time, session.duration);
    let mut mounted = MountedTimer::mount(countdown, system_clock());
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;
    // Extension calls run off the render loop and report back here
    let (extend_tx, mut extend_rx) = mpsc::channel::<ClientResult<ExtendOutcome>>(4);

    loop {
        tokio::select! {
            event = mounted.next_event() => match event {
                Some(DisplayEvent::Tick { remaining }) => render(&format_mm_ss(remaining)),
                Some(DisplayEvent::Ended) | None => {
                    println!("\n{}", ENDED_SIGNAL);
                    break;
                }
            },
            line = input.next_line(), if input_open => match line {
                Ok(Some(line)) => match parse_command(&line) {
                    Ok(Command::Extend { minutes }) => {
                        let session_id = mounted.snapshot().await.session_id;
                        let client = client.clone();
                        let member_id = config.member_id.clone();
                        let extend_tx = extend_tx.clone();
                        tokio::spawn(async move {
                            let result = client
                                .extend(session_id, member_id.as_deref(), minutes)
                                .await;
                            let _ = extend_tx.send(result).await;
                        });
                    }
                    Ok(Command::Quit) => break,
                    Err(message) => render_error(&message),
                },
                // Input closed; keep counting down
                Ok(None) => input_open = false,
                Err(e) => render_error(&format!("Failed to read input: {}", e)),
            },
            Some(result) = extend_rx.recv() => match result {
                Ok(outcome) => {
                    let countdown = mounted.extend(outcome.extend_period).await;
                    info!(
                        session_id = %outcome.session_id,
                        granted = outcome.extend_period,
                        server_duration = outcome.new_duration,
                        local_duration = countdown.duration,
                        "Extension applied"
                    );
                }
                Err(e) => {
                    warn!("Extension failed: {}", e);
                    render_error(&format!("Extension failed: {}", e));
                }
            },
        }
    }

    Ok(())
}

fn render(text: &str) {
    let mut stdout = std::io::stdout();
    let _ = write!(stdout, "\r{}", text);
    let _ = stdout.flush();
}

fn render_error(message: &str) {
    println!("\n{}", message);
}
