//! Owns the configuration and the loop/watchdog threads

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::cycle::FishingCycle;
use crate::error::MacroError;
use crate::input::{Controls, InputActuator};
use crate::log_main;
use crate::screen_reader::fruit_ocr::DropScanner;
use crate::screen_reader::screen_service::FrameSource;
use crate::utils::bot_state::{CycleState, RunCounters, SharedSignals};
use crate::utils::settings::Settings;
use crate::utils::webhook::{validate_webhook_url, DiscordWebhook, Notifier};
use crate::watchdog::{Watchdog, WatchdogConfig};

/// Builds a fresh frame source for each run
pub type SamplerFactory = Arc<dyn Fn() -> Box<dyn FrameSource> + Send + Sync>;
/// Builds a fresh drop scanner for each run
pub type ScannerFactory = Arc<dyn Fn() -> Box<dyn DropScanner> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    /// The previous loop has not unwound yet
    StillStopping,
}

/// Run statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroStatus {
    pub running: bool,
    pub state: CycleState,
    pub fish_count: u32,
    pub fruit_count: u32,
    pub time_elapsed: String,
    pub fish_per_hour: f64,
    pub recoveries: u32,
    pub recast_failures: u32,
    pub watchdog_active: bool,
}

/// `h:mm:ss`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Catch rate rounded to one decimal, 0 before the first full second
pub fn fish_per_hour(fish: u32, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs();
    if secs == 0 {
        return 0.0;
    }
    (fish as f64 / secs as f64 * 3600.0 * 10.0).round() / 10.0
}

/// Elapsed run time that survives stop/start
#[derive(Debug, Default)]
struct RunClock {
    started: Option<Instant>,
    banked: Duration,
}

impl RunClock {
    fn resume(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        if let Some(started) = self.started.take() {
            self.banked += started.elapsed();
        }
    }

    fn elapsed(&self) -> Duration {
        self.banked + self.started.map_or(Duration::ZERO, |s| s.elapsed())
    }
}

struct Shared {
    settings: Arc<RwLock<Settings>>,
    settings_path: Option<PathBuf>,
    sessions_path: Option<PathBuf>,
    signals: Arc<SharedSignals>,
    counters: Arc<RunCounters>,
    controls: Controls,
    notifier: Arc<dyn Notifier>,
    watchdog: Arc<Watchdog>,
    sampler_factory: SamplerFactory,
    scanner_factory: Option<ScannerFactory>,
    clock: Mutex<RunClock>,
}

impl Shared {
    /// Bookkeeping once the loop thread has returned
    fn finish_run(&self) {
        self.signals.set_running(false);
        self.watchdog.stop();
        self.controls.release_if_held();
        self.clock.lock().pause();
        if let Some(path) = &self.sessions_path {
            log_main::end_session(
                path,
                self.counters.fish_count(),
                self.counters.fruit_count(),
            );
        }
    }
}

/// Runs the controller bookkeeping when the loop thread ends, panics included
struct FinishOnDrop(Arc<Shared>);

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        if thread::panicking() {
            tracing::error!("[CONTROLLER] Fishing loop panicked, stopping the macro");
        }
        self.0.finish_run();
    }
}

pub struct MacroController {
    shared: Arc<Shared>,
    watchdog_config: WatchdogConfig,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl MacroController {
    /// Controller with webhook notifications and the default watchdog limits
    pub fn new(
        settings: Settings,
        actuator: Arc<dyn InputActuator>,
        sampler_factory: SamplerFactory,
    ) -> Self {
        let settings = Arc::new(RwLock::new(settings));
        let signals = Arc::new(SharedSignals::new());
        let counters = Arc::new(RunCounters::new());
        let controls = Controls::new(actuator, signals.clone());
        let notifier: Arc<dyn Notifier> = Arc::new(DiscordWebhook::new(settings.clone()));
        let watchdog_config = WatchdogConfig::default();
        let watchdog = Arc::new(Watchdog::new(
            watchdog_config.clone(),
            signals.clone(),
            controls.clone(),
            settings.clone(),
            counters.clone(),
            notifier.clone(),
        ));

        Self {
            shared: Arc::new(Shared {
                settings,
                settings_path: None,
                sessions_path: None,
                signals,
                counters,
                controls,
                notifier,
                watchdog,
                sampler_factory,
                scanner_factory: None,
                clock: Mutex::new(RunClock::default()),
            }),
            watchdog_config,
            loop_handle: Mutex::new(None),
        }
    }

    /// Rebuild the shared part while nothing runs yet
    fn rebuild(self, edit: impl FnOnce(&mut Shared, &mut WatchdogConfig)) -> Self {
        let Self {
            shared,
            mut watchdog_config,
            loop_handle,
        } = self;
        let mut shared = match Arc::try_unwrap(shared) {
            Ok(shared) => shared,
            Err(shared) => {
                tracing::warn!("[CONTROLLER] Configuration change ignored, controller is shared");
                return Self {
                    shared,
                    watchdog_config,
                    loop_handle,
                };
            }
        };
        edit(&mut shared, &mut watchdog_config);
        shared.watchdog = Arc::new(Watchdog::new(
            watchdog_config.clone(),
            shared.signals.clone(),
            shared.controls.clone(),
            shared.settings.clone(),
            shared.counters.clone(),
            shared.notifier.clone(),
        ));
        Self {
            shared: Arc::new(shared),
            watchdog_config,
            loop_handle,
        }
    }

    pub fn with_notifier(self, notifier: Arc<dyn Notifier>) -> Self {
        self.rebuild(|shared, _| shared.notifier = notifier)
    }

    pub fn with_watchdog_config(self, config: WatchdogConfig) -> Self {
        self.rebuild(|_, current| *current = config)
    }

    pub fn with_scanner_factory(self, factory: ScannerFactory) -> Self {
        self.rebuild(|shared, _| shared.scanner_factory = Some(factory))
    }

    /// Persist settings changes to `path`
    pub fn with_settings_path(self, path: PathBuf) -> Self {
        self.rebuild(|shared, _| shared.settings_path = Some(path))
    }

    /// Record run history to `path`
    pub fn with_sessions_path(self, path: PathBuf) -> Self {
        self.rebuild(|shared, _| shared.sessions_path = Some(path))
    }

    pub fn is_running(&self) -> bool {
        self.shared.signals.is_running()
    }

    /// Validate the calibration and launch the loop and the watchdog
    pub fn start(&self) -> Result<StartOutcome, MacroError> {
        let shared = &self.shared;
        if shared.signals.is_running() {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let mut handle = self.loop_handle.lock();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::warn!("[CONTROLLER] Previous loop is still stopping");
            return Ok(StartOutcome::StillStopping);
        }
        if let Some(old) = handle.take() {
            let _ = old.join();
        }

        let settings = shared.settings.read().clone();
        settings.validate_for_start()?;

        shared.signals.take_restart();
        shared.counters.set_bait_loops(if settings.auto_buy_common_bait {
            settings.loops_per_purchase
        } else {
            0
        });
        shared.signals.enter_state(CycleState::Idle);
        shared.clock.lock().resume();
        shared.signals.set_running(true);
        shared.watchdog.start();
        if let Some(path) = &shared.sessions_path {
            log_main::begin_session(path);
        }

        let run_shared = Arc::clone(shared);
        let spawned = thread::Builder::new()
            .name("fishing-loop".into())
            .spawn(move || {
                let finish = FinishOnDrop(run_shared);
                let run_shared = &finish.0;
                let sampler = (run_shared.sampler_factory)();
                let mut cycle = FishingCycle::new(
                    sampler,
                    run_shared.controls.clone(),
                    run_shared.signals.clone(),
                    run_shared.settings.clone(),
                    run_shared.counters.clone(),
                )
                .with_notifier(run_shared.notifier.clone());
                if let Some(factory) = &run_shared.scanner_factory {
                    cycle = cycle.with_scanner(factory());
                }
                cycle.run();
            });

        match spawned {
            Ok(h) => {
                *handle = Some(h);
                tracing::info!("[CONTROLLER] Macro started");
                Ok(StartOutcome::Started)
            }
            Err(e) => {
                tracing::error!("[CONTROLLER] Failed to spawn fishing loop: {}", e);
                shared.finish_run();
                Err(MacroError::LoopSpawn(e))
            }
        }
    }

    /// Request a stop; returns false when nothing was running
    pub fn stop(&self) -> bool {
        let shared = &self.shared;
        if !shared.signals.is_running() {
            return false;
        }
        shared.signals.set_running(false);
        shared.watchdog.stop();
        shared.controls.release_if_held();
        shared.clock.lock().pause();
        tracing::info!("[CONTROLLER] Macro stopped");
        true
    }

    /// Start when stopped, stop when running. Returns whether the macro now runs.
    pub fn toggle(&self) -> Result<bool, MacroError> {
        if self.stop() {
            return Ok(false);
        }
        Ok(self.start()? == StartOutcome::Started)
    }

    /// Stop and wait for the loop thread to unwind
    pub fn shutdown(&self) {
        self.stop();
        if let Some(handle) = self.loop_handle.lock().take() {
            if handle.join().is_err() {
                tracing::error!("[CONTROLLER] Fishing loop panicked");
            }
        }
    }

    pub fn snapshot(&self) -> MacroStatus {
        let shared = &self.shared;
        let elapsed = shared.clock.lock().elapsed();
        let fish = shared.counters.fish_count();
        MacroStatus {
            running: shared.signals.is_running(),
            state: shared.signals.current_state(),
            fish_count: fish,
            fruit_count: shared.counters.fruit_count(),
            time_elapsed: format_elapsed(elapsed),
            fish_per_hour: fish_per_hour(fish, elapsed),
            recoveries: shared.signals.recovery_count(),
            recast_failures: shared.counters.recast_failures(),
            watchdog_active: shared.watchdog.is_active(),
        }
    }

    pub fn settings(&self) -> Settings {
        self.shared.settings.read().clone()
    }

    /// Apply `edit` to the live settings and persist them. A running loop picks the
    /// change up at its next iteration.
    pub fn update_settings(&self, edit: impl FnOnce(&mut Settings)) -> Result<(), MacroError> {
        let snapshot = {
            let mut settings = self.shared.settings.write();
            edit(&mut settings);
            settings.clone()
        };
        if let Some(path) = &self.shared.settings_path {
            snapshot.save(path).map_err(MacroError::SettingsSave)?;
        }
        Ok(())
    }

    /// Set the webhook URL; a non-empty URL enables notifications, an empty one
    /// disables them
    pub fn set_webhook_url(&self, url: &str) -> Result<(), MacroError> {
        let url = url.trim();
        if !url.is_empty() {
            validate_webhook_url(url)?;
        }
        self.update_settings(|s| {
            s.webhook_url = url.to_string();
            s.webhook_enabled = !url.is_empty();
        })
    }

    pub fn reset_advanced(&self) -> Result<(), MacroError> {
        self.update_settings(Settings::reset_advanced)
    }
}
