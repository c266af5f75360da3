//! Process lifecycle runner for long-running services.
//!
//! The runner starts a set of named app processes concurrently, stops all of
//! them when one fails or a shutdown signal (SIGINT/SIGTERM) arrives, then
//! runs every registered closer under a shared timeout.
//!
//! # Example
//!
//! ```no_run
//! use agv_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let outcome = Runner::new()
//!         .with_named_process("heartbeat", |ctx| async move {
//!             while !ctx.is_cancelled() {
//!                 tokio::select! {
//!                     _ = ctx.cancelled() => {}
//!                     _ = tokio::time::sleep(Duration::from_secs(1)) => {
//!                         tracing::info!("still alive");
//!                     }
//!                 }
//!             }
//!             Ok(())
//!         })
//!         .with_closer(|| async move {
//!             tracing::info!("releasing resources");
//!             Ok(())
//!         })
//!         .with_closer_timeout(Duration::from_secs(5))
//!         .run()
//!         .await;
//!
//!     std::process::exit(outcome.exit_code());
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// An app process: receives the shared cancellation token and runs until it
/// is cancelled or fails.
pub type AppProcess = Box<dyn FnOnce(CancellationToken) -> BoxFuture<anyhow::Result<()>> + Send>;

/// A cleanup function executed after all app processes have stopped.
pub type Closer = Box<dyn FnOnce() -> BoxFuture<anyhow::Result<()>> + Send>;

struct NamedProcess {
    name: String,
    process: AppProcess,
}

/// How a [`Runner::run`] call ended
#[derive(Debug)]
pub enum RunOutcome {
    /// Every app process returned `Ok` on its own
    Completed,
    /// The cancellation token fired (signal or external cancel)
    ShutdownRequested,
    /// An app process returned an error or panicked
    Failed { process: String, error: anyhow::Error },
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Completed | RunOutcome::ShutdownRequested => 0,
            RunOutcome::Failed { .. } => 1,
        }
    }
}

pub struct Runner {
    processes: Vec<NamedProcess>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
    handle_signals: bool,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// Defaults: 10 second closer timeout, signal handling enabled.
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
            handle_signals: true,
        }
    }

    /// Adds an app process identified by `name` in logs and in [`RunOutcome::Failed`].
    pub fn with_named_process<N, F, Fut>(mut self, name: N, process: F) -> Self
    where
        N: Into<String>,
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.processes.push(NamedProcess {
            name: name.into(),
            process: Box::new(move |token| Box::pin(process(token))),
        });
        self
    }

    /// Adds a closer. Closers run concurrently once every process has stopped,
    /// whatever the reason; a failing closer does not prevent the others.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers.push(Box::new(move || Box::pin(closer())));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Uses an externally owned token, so callers can trigger shutdown.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Disables SIGINT/SIGTERM listeners.
    pub fn without_signal_handlers(mut self) -> Self {
        self.handle_signals = false;
        self
    }

    /// Runs all processes to completion, then the closers.
    pub async fn run(self) -> RunOutcome {
        let token = self.cancellation_token;

        if self.handle_signals {
            spawn_signal_listeners(token.clone());
        }

        let mut join_set = JoinSet::new();
        for NamedProcess { name, process } in self.processes {
            let process_token = token.clone();
            info!(process = %name, "starting app process");
            join_set.spawn(async move {
                let result = process(process_token).await;
                (name, result)
            });
        }

        let mut failure: Option<(String, anyhow::Error)> = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => {
                    debug!(process = %name, "app process completed");
                }
                Ok((name, Err(err))) => {
                    if !token.is_cancelled() {
                        error!(process = %name, error = %format!("{err:#}"), "app process failed");
                        failure = Some((name, err));
                        token.cancel();
                    } else {
                        debug!(process = %name, error = %format!("{err:#}"), "app process errored during shutdown");
                    }
                }
                Err(join_err) => {
                    error!(error = %join_err, "app process panicked");
                    if failure.is_none() {
                        failure = Some((
                            "unknown".to_string(),
                            anyhow::anyhow!("app process panicked: {join_err}"),
                        ));
                    }
                    token.cancel();
                }
            }

            if token.is_cancelled() {
                break;
            }
        }

        // Processes that ignore cancellation are aborted here
        join_set.shutdown().await;

        run_closers(self.closers, self.closer_timeout).await;

        match failure {
            Some((process, error)) => {
                error!(process = %process, "application exiting with error");
                RunOutcome::Failed { process, error }
            }
            None if token.is_cancelled() => {
                info!("application shut down on request");
                RunOutcome::ShutdownRequested
            }
            None => {
                info!("application exiting normally");
                RunOutcome::Completed
            }
        }
    }
}

fn spawn_signal_listeners(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received SIGINT, shutting down");
                ctrl_c_token.cancel();
            }
            Err(err) => error!(error = %err, "failed to listen for SIGINT"),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("received SIGTERM, shutting down");
                token.cancel();
            }
            Err(err) => error!(error = %err, "failed to listen for SIGTERM"),
        }
    });
}

async fn run_closers(closers: Vec<Closer>, timeout: Duration) {
    if closers.is_empty() {
        return;
    }

    info!(timeout_ms = timeout.as_millis() as u64, "running closers");

    let mut closer_set = JoinSet::new();
    for closer in closers {
        closer_set.spawn(closer());
    }

    let drain = async {
        while let Some(result) = closer_set.join_next().await {
            match result {
                Ok(Ok(())) => debug!("closer completed"),
                Ok(Err(err)) => error!(error = %format!("{err:#}"), "closer failed"),
                Err(err) => error!(error = %err, "closer panicked"),
            }
        }
    };

    match tokio::time::timeout(timeout, drain).await {
        Ok(()) => info!("all closers completed"),
        Err(_) => error!(timeout_ms = timeout.as_millis() as u64, "closers timed out"),
    }
}
