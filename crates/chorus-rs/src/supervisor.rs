//! Keeps every enabled bot connected.
//!
//! Each bot runs on its own worker thread with a single-threaded tokio
//! runtime, so one bot's turns never compete with another's. The
//! supervisor checks its workers on a fixed interval and relaunches dead
//! ones after an exponentially growing delay.

use chorus_rs_config::{ChorusConfig, SupervisorConfig};
use chorus_rs_core::{BotRuntime, ChorusCoreError, LlmPair};
use chorus_rs_protocol::{BotIdentity, PlatformConnector};
use log::{error, info, warn};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

/// Builds the model clients for one worker.
///
/// Called again on every restart so clients are bound to the worker's own
/// runtime.
pub type LlmFactory =
    Arc<dyn Fn(&BotIdentity) -> Result<LlmPair, ChorusCoreError> + Send + Sync>;

/// Supervisor timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorTiming {
    pub check_interval: Duration,
    pub launch_stagger: Duration,
    pub restart_backoff: Duration,
    pub max_backoff: Duration,
}

impl From<&SupervisorConfig> for SupervisorTiming {
    fn from(config: &SupervisorConfig) -> Self {
        Self {
            check_interval: Duration::from_secs(config.check_interval_secs),
            launch_stagger: Duration::from_secs(config.launch_stagger_secs),
            restart_backoff: Duration::from_secs(config.restart_backoff_secs),
            max_backoff: Duration::from_secs(config.max_backoff_secs),
        }
    }
}

/// Doubling restart delay, capped.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let max = max.max(initial);
        Self {
            initial,
            max,
            next: initial,
        }
    }

    /// Delay before the next restart; doubles the one after it.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.initial;
    }

    pub fn max(&self) -> Duration {
        self.max
    }
}

/// Run one bot until its platform connection ends.
///
/// Only returns on failure: startup errors, connect errors, or a lost
/// connection.
pub async fn run_worker(
    identity: BotIdentity,
    config: Arc<ChorusConfig>,
    cwd: &Path,
    connector: &dyn PlatformConnector,
    llms: &LlmFactory,
) -> Result<(), ChorusCoreError> {
    let pair = llms(&identity)?;
    let runtime = BotRuntime::start(identity.clone(), config, cwd, pair)?;
    let connection = match connector.connect(&identity).await {
        Ok(connection) => connection,
        Err(err) => {
            runtime
                .audit()
                .record(&format!("Failed to connect to chat platform: {err}"));
            return Err(err.into());
        }
    };
    runtime.run(connection).await
}

/// Launches and restarts bot workers.
pub struct Supervisor {
    config: Arc<ChorusConfig>,
    cwd: PathBuf,
    connector: Arc<dyn PlatformConnector>,
    llms: LlmFactory,
    timing: SupervisorTiming,
}

impl Supervisor {
    pub fn new(
        config: Arc<ChorusConfig>,
        cwd: impl AsRef<Path>,
        connector: Arc<dyn PlatformConnector>,
        llms: LlmFactory,
    ) -> Self {
        let timing = SupervisorTiming::from(&config.supervisor);
        Self {
            config,
            cwd: cwd.as_ref().to_path_buf(),
            connector,
            llms,
            timing,
        }
    }

    /// Override the timing taken from the config.
    pub fn with_timing(mut self, timing: SupervisorTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Launch `roster` and keep it alive until `shutdown` resolves.
    ///
    /// Workers still running at shutdown are left to exit with the process.
    pub async fn run<F>(&self, roster: Vec<BotIdentity>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut workers: Vec<Worker> = Vec::with_capacity(roster.len());
        for (idx, identity) in roster.into_iter().enumerate() {
            if idx > 0 {
                tokio::select! {
                    _ = &mut shutdown => {
                        info!("supervisor stopped during launch (launched={})", workers.len());
                        return;
                    }
                    _ = tokio::time::sleep(self.timing.launch_stagger) => {}
                }
            }
            let mut worker = Worker::new(
                identity,
                Backoff::new(self.timing.restart_backoff, self.timing.max_backoff),
            );
            worker.launch(self);
            workers.push(worker);
        }

        let mut ticker = tokio::time::interval(self.timing.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("supervisor stopped (workers={})", workers.len());
                    return;
                }
                _ = ticker.tick() => {
                    let now = Instant::now();
                    for worker in &mut workers {
                        worker.check(now, self);
                    }
                }
            }
        }
    }

    fn spawn_thread(&self, identity: BotIdentity) -> std::io::Result<JoinHandle<()>> {
        let config = self.config.clone();
        let cwd = self.cwd.clone();
        let connector = self.connector.clone();
        let llms = self.llms.clone();
        thread::Builder::new()
            .name(format!("chorus-{}", identity.name))
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        error!("worker runtime failed (bot={}, err={err})", identity.name);
                        return;
                    }
                };
                let name = identity.name.clone();
                let result = runtime.block_on(run_worker(
                    identity,
                    config,
                    &cwd,
                    connector.as_ref(),
                    &llms,
                ));
                if let Err(err) = result {
                    warn!("bot worker exited (bot={name}, err={err})");
                }
            })
    }
}

struct Worker {
    identity: BotIdentity,
    handle: Option<JoinHandle<()>>,
    started: Instant,
    backoff: Backoff,
    restart_at: Option<Instant>,
    restarts: u32,
}

impl Worker {
    fn new(identity: BotIdentity, backoff: Backoff) -> Self {
        Self {
            identity,
            handle: None,
            started: Instant::now(),
            backoff,
            restart_at: None,
            restarts: 0,
        }
    }

    fn launch(&mut self, supervisor: &Supervisor) {
        self.started = Instant::now();
        match supervisor.spawn_thread(self.identity.clone()) {
            Ok(handle) => {
                info!(
                    "bot worker launched (bot={}, restarts={})",
                    self.identity.name, self.restarts
                );
                self.handle = Some(handle);
            }
            Err(err) => {
                error!(
                    "bot worker spawn failed (bot={}, err={err})",
                    self.identity.name
                );
                self.handle = None;
            }
        }
    }

    fn is_alive(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn check(&mut self, now: Instant, supervisor: &Supervisor) {
        if let Some(restart_at) = self.restart_at {
            if now >= restart_at {
                self.restart_at = None;
                self.restarts += 1;
                println!("Restarting {}...", self.identity.name);
                self.launch(supervisor);
            }
            return;
        }
        if self.is_alive() {
            return;
        }

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("bot worker panicked (bot={})", self.identity.name);
            }
        }
        if now.duration_since(self.started) >= self.backoff.max() {
            self.backoff.reset();
        }
        let delay = self.backoff.next_delay();
        warn!(
            "bot worker down, scheduling restart (bot={}, delay_ms={})",
            self.identity.name,
            delay.as_millis()
        );
        self.restart_at = Some(now + delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let mut backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(30));
        let delays: Vec<u64> = (0..5).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![5, 10, 20, 30, 30]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
    }

    #[test]
    fn backoff_cap_never_below_initial() {
        let mut backoff = Backoff::new(Duration::from_secs(8), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(8));
        assert_eq!(backoff.next_delay(), Duration::from_secs(8));
    }

    #[test]
    fn timing_comes_from_config_seconds() {
        let timing = SupervisorTiming::from(&SupervisorConfig::default());
        assert_eq!(timing.check_interval, Duration::from_secs(10));
        assert_eq!(timing.launch_stagger, Duration::from_secs(2));
        assert_eq!(timing.restart_backoff, Duration::from_secs(5));
        assert_eq!(timing.max_backoff, Duration::from_secs(300));
    }
}
