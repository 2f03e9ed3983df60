//! Haiku Fishing - auto fishing macro
//!
//! Loads the settings document, registers the global hotkeys and drives the
//! [`MacroController`] from them until the exit hotkey is pressed.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};

use haiku_fishing::controller::{SamplerFactory, ScannerFactory};
use haiku_fishing::input::PlatformActuator;
use haiku_fishing::log_main::get_sessions_path;
use haiku_fishing::screen_reader::{
    screen_size, DropScanner, FrameSource, ScreenService, TesseractScanner,
};
use haiku_fishing::utils::keybinds::{parse_hotkey, resolve_key};
use haiku_fishing::utils::path::{get_data_dir, get_settings_path};
use haiku_fishing::{MacroController, Settings};

const EVENT_POLL: Duration = Duration::from_millis(20);

/// Default level 'info', chatty HTTP internals at 'warn'
const LOG_FILTER: &str =
    "info,haiku_fishing=info,reqwest=warn,hyper=warn,hyper_util=warn,mio=warn,want=warn,rustls=warn";

fn init_logging() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let log_dir = get_data_dir().join("debug").join("log");
    let _ = std::fs::create_dir_all(&log_dir);
    let log_file_path = log_dir.join("debug.log");
    let file_result = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(LOG_FILTER));

    match file_result {
        Ok(file) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false);
            let stdout_layer = tracing_subscriber::fmt::layer();

            tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(stdout_layer)
                .init();

            tracing::info!("[INIT] Logging initialized, file: {:?}", log_file_path);
        }
        Err(e) => {
            tracing_subscriber::fmt().with_env_filter(env_filter).init();
            tracing::warn!(
                "[INIT] Failed to create debug log file at {:?}: {}",
                log_file_path,
                e
            );
        }
    }
}

/// Drain the thread's message queue so hotkey events get delivered
#[cfg(windows)]
fn pump_messages() {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE,
    };

    let mut msg = MSG::default();
    unsafe {
        while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).as_bool() {
            let _ = TranslateMessage(&msg);
            let _ = DispatchMessageW(&msg);
        }
    }
}

#[cfg(not(windows))]
fn pump_messages() {}

fn main() -> anyhow::Result<()> {
    init_logging();
    tracing::info!("Haiku Fishing {}", env!("CARGO_PKG_VERSION"));

    let screen = screen_size();
    let settings_path = get_settings_path();
    let settings = Settings::load(&settings_path, screen);
    if !settings_path.exists() {
        if let Err(e) = settings.save(&settings_path) {
            tracing::warn!("[INIT] Failed to write default settings: {:#}", e);
        }
    }
    let hotkeys = settings.hotkeys.clone();
    for (name, key) in [
        ("rod_hotkey", &settings.rod_hotkey),
        ("anything_else_hotkey", &settings.anything_else_hotkey),
        ("devil_fruit_hotkey", &settings.devil_fruit_hotkey),
    ] {
        if resolve_key(key).is_none() {
            tracing::warn!("[INIT] {} '{}' is not a key the macro can press", name, key);
        }
    }

    let actuator = Arc::new(PlatformActuator::new().context("Failed to initialize input")?);
    let sampler_factory: SamplerFactory =
        Arc::new(|| Box::new(ScreenService::new()) as Box<dyn FrameSource>);
    let scanner_factory: ScannerFactory = Arc::new(move || {
        Box::new(TesseractScanner::new(Box::new(ScreenService::new()), screen))
            as Box<dyn DropScanner>
    });

    let controller = MacroController::new(settings, actuator, sampler_factory)
        .with_scanner_factory(scanner_factory)
        .with_settings_path(settings_path)
        .with_sessions_path(get_sessions_path());

    let manager = GlobalHotKeyManager::new().context("Failed to create hotkey manager")?;
    let start_stop = parse_hotkey(&hotkeys.start_stop)
        .with_context(|| format!("Invalid start/stop hotkey {:?}", hotkeys.start_stop))?;
    let exit = parse_hotkey(&hotkeys.exit)
        .with_context(|| format!("Invalid exit hotkey {:?}", hotkeys.exit))?;
    manager
        .register(start_stop)
        .context("Failed to register start/stop hotkey")?;
    manager
        .register(exit)
        .context("Failed to register exit hotkey")?;
    tracing::info!(
        "[INIT] Hotkeys: START/STOP={}, EXIT={}",
        hotkeys.start_stop,
        hotkeys.exit
    );

    let receiver = GlobalHotKeyEvent::receiver();
    'events: loop {
        pump_messages();

        while let Ok(event) = receiver.try_recv() {
            if event.state != HotKeyState::Pressed {
                continue;
            }
            if event.id == exit.id() {
                break 'events;
            }
            if event.id == start_stop.id() {
                match controller.toggle() {
                    Ok(true) => tracing::info!("[MAIN] Macro running"),
                    Ok(false) => tracing::info!("[MAIN] Macro not running"),
                    Err(e) => tracing::warn!("[MAIN] Cannot start: {}", e),
                }
            }
        }

        thread::sleep(EVENT_POLL);
    }

    tracing::info!("[MAIN] Exiting, cleaning up...");
    controller.shutdown();
    match serde_json::to_string(&controller.snapshot()) {
        Ok(stats) => tracing::info!("[MAIN] Final stats: {}", stats),
        Err(e) => tracing::debug!("[MAIN] Failed to serialize stats: {}", e),
    }
    Ok(())
}
