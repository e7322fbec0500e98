//! Mounting a countdown: session resolution, the ticking task and user commands

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::{
    client::{ClientError, ClientResult, SessionClient, SessionSnapshot},
    countdown::Countdown,
};

/// Source of the current time
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Clock reading the system time
pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Events emitted towards the embedding context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    /// One second elapsed
    Tick { remaining: i64 },
    /// The countdown reached zero; no further ticks follow
    Ended,
}

/// How the display obtains its session
#[derive(Debug, Clone)]
pub enum Resolve {
    /// Start a session for the token, adopting an existing one on conflict
    Create { access_token: String },
    /// Poll until a session exists for the token; failed lookups are retried
    Poll {
        access_token: String,
        interval: Duration,
    },
}

/// Resolve the session the display counts down
pub async fn resolve_session(
    client: &SessionClient,
    resolve: &Resolve,
) -> ClientResult<SessionSnapshot> {
    match resolve {
        Resolve::Create { access_token } => match client.start(access_token).await {
            Ok(session) => {
                info!(session_id = %session.session_id, "Started timer session");
                Ok(session)
            }
            Err(ClientError::Conflict { session_id }) => {
                info!(%session_id, "Adopting already active session");
                client
                    .check(Some(session_id), None)
                    .await?
                    .ok_or(ClientError::Api {
                        status: 404,
                        message: "Active session vanished".to_string(),
                    })
            }
            Err(e) => Err(e),
        },
        Resolve::Poll {
            access_token,
            interval,
        } => loop {
            match client.check(None, Some(access_token)).await {
                Ok(Some(session)) if session.is_active => {
                    info!(session_id = %session.session_id, "Found active session");
                    return Ok(session);
                }
                Ok(_) => {}
                Err(e) => warn!("Session lookup failed, retrying: {}", e),
            }
            tokio::time::sleep(*interval).await;
        },
    }
}

/// A countdown with its ticking task
///
/// Dropping the handle aborts the task, so mounting again never leaves a
/// second timer running.
pub struct MountedTimer {
    countdown: Arc<Mutex<Countdown>>,
    events: mpsc::Receiver<DisplayEvent>,
    task: JoinHandle<()>,
}

impl MountedTimer {
    /// Start ticking once per second
    pub fn mount(countdown: Countdown, clock: Clock) -> Self {
        let countdown = Arc::new(Mutex::new(countdown));
        let (tx, events) = mpsc::channel(16);

        let task = tokio::spawn(tick(countdown.clone(), clock, tx));

        Self {
            countdown,
            events,
            task,
        }
    }

    /// Next event, or `None` once the countdown has ended
    pub async fn next_event(&mut self) -> Option<DisplayEvent> {
        self.events.recv().await
    }

    /// Add granted seconds to the local countdown
    pub async fn extend(&self, seconds: i64) -> Countdown {
        let mut countdown = self.countdown.lock().await;
        countdown.extend(seconds);
        countdown.clone()
    }

    /// Current countdown state
    pub async fn snapshot(&self) -> Countdown {
        self.countdown.lock().await.clone()
    }
}

impl Drop for MountedTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn tick(countdown: Arc<Mutex<Countdown>>, clock: Clock, tx: mpsc::Sender<DisplayEvent>) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));

    loop {
        interval.tick().await;

        let remaining = countdown.lock().await.remaining(clock());
        if tx.send(DisplayEvent::Tick { remaining }).await.is_err() {
            return;
        }

        if remaining == 0 {
            if tx.send(DisplayEvent::Ended).await.is_err() {
                warn!("Display closed before the end event was delivered");
            }
            return;
        }
    }
}

/// Commands typed by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Buy extra minutes
    Extend { minutes: i64 },
    /// Leave the display
    Quit,
}

/// Parse one input line into a command
pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();

    match parts.next() {
        Some("e" | "extend") => {
            let minutes = parts
                .next()
                .ok_or_else(|| "usage: extend <minutes>".to_string())?
                .parse::<i64>()
                .map_err(|_| "minutes must be a whole number".to_string())?;
            if minutes <= 0 {
                return Err("minutes must be positive".to_string());
            }
            Ok(Command::Extend { minutes })
        }
        Some("q" | "quit") => Ok(Command::Quit),
        Some(other) => Err(format!("unknown command: {}", other)),
        None => Err("empty command".to_string()),
    }
}
