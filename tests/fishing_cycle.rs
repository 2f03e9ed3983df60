//! Drives the fishing cycle with synthetic frames and a recording actuator

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use parking_lot::{Mutex, RwLock};

use haiku_fishing::cycle::{FishOutcome, FishingCycle, Iteration, WaitOutcome};
use haiku_fishing::input::{Action, Controls, InputActuator, InputError, MouseButton};
use haiku_fishing::screen_reader::color::{BITE_BLUE, BITE_DARK_GRAY, BITE_WHITE, PURE_BLACK};
use haiku_fishing::screen_reader::{DropScan, DropScanner, FrameSource};
use haiku_fishing::utils::bot_state::{CycleState, RunCounters, SharedSignals};
use haiku_fishing::utils::settings::{Point, ScreenRegion, Settings};
use haiku_fishing::utils::webhook::Notifier;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Move(i32, i32),
    Nudge,
    Button(MouseButton, Action),
    Key(String, Action),
    Text(String),
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
    /// Stop the macro when the pointer is moved to this position
    stop_at: Mutex<Option<(i32, i32, Arc<SharedSignals>)>>,
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    fn left(&self) -> Vec<Action> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Button(MouseButton::Left, a) => Some(a),
                _ => None,
            })
            .collect()
    }
}

impl InputActuator for Recorder {
    fn move_to(&self, x: i32, y: i32) -> Result<(), InputError> {
        self.events.lock().push(Event::Move(x, y));
        if let Some((sx, sy, signals)) = self.stop_at.lock().as_ref() {
            if (*sx, *sy) == (x, y) {
                signals.set_running(false);
            }
        }
        Ok(())
    }
    fn move_by(&self, _: i32, _: i32) -> Result<(), InputError> {
        self.events.lock().push(Event::Nudge);
        Ok(())
    }
    fn button(&self, button: MouseButton, action: Action) -> Result<(), InputError> {
        self.events.lock().push(Event::Button(button, action));
        Ok(())
    }
    fn key(&self, key: &str, action: Action) -> Result<(), InputError> {
        self.events.lock().push(Event::Key(key.to_string(), action));
        Ok(())
    }
    fn type_text(&self, text: &str) -> Result<(), InputError> {
        self.events.lock().push(Event::Text(text.to_string()));
        Ok(())
    }
}

/// Plays back queued frames, then repeats `fallback`
struct Script {
    frames: VecDeque<RgbaImage>,
    fallback: RgbaImage,
    captures: usize,
    /// Called with the 1-based capture number before the frame is returned
    on_capture: Option<Box<dyn FnMut(usize) + Send>>,
}

impl Script {
    fn new(frames: Vec<RgbaImage>, fallback: RgbaImage) -> Self {
        Self {
            frames: frames.into(),
            fallback,
            captures: 0,
            on_capture: None,
        }
    }
}

impl FrameSource for Script {
    fn capture(&mut self, _: &ScreenRegion) -> anyhow::Result<RgbaImage> {
        self.captures += 1;
        if let Some(hook) = self.on_capture.as_mut() {
            hook(self.captures);
        }
        Ok(self
            .frames
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

#[derive(Default)]
struct CountingNotifier {
    recast_failures: AtomicU32,
    purchases: AtomicU32,
    devil_fruits: AtomicU32,
}

impl Notifier for CountingNotifier {
    fn notify_recovery(&self, _: u32, _: u32) {}
    fn notify_recast_failure(&self, _: u32, _: u32) {
        self.recast_failures.fetch_add(1, Ordering::SeqCst);
    }
    fn notify_purchase(&self, _: u32, _: u32) {
        self.purchases.fetch_add(1, Ordering::SeqCst);
    }
    fn notify_devil_fruit(&self, _: u32) {
        self.devil_fruits.fetch_add(1, Ordering::SeqCst);
    }
}

struct LegendaryDrop;

impl DropScanner for LegendaryDrop {
    fn scan(&mut self, _: &Settings) -> DropScan {
        DropScan {
            has_fruit: true,
            is_legendary: true,
        }
    }
}

const AREA: ScreenRegion = ScreenRegion {
    x1: 0,
    y1: 100,
    x2: 100,
    y2: 140,
};

fn blank() -> RgbaImage {
    RgbaImage::from_pixel(100, 40, Rgba([60, 80, 100, 255]))
}

fn black() -> RgbaImage {
    RgbaImage::from_pixel(100, 40, PURE_BLACK.to_rgba())
}

/// Marker at row 30, target rows 6..=7 and tracker rows 8..=25 in column 50
fn minigame() -> RgbaImage {
    let mut frame = blank();
    for x in 40..=60 {
        frame.put_pixel(x, 30, BITE_BLUE.to_rgba());
    }
    frame.put_pixel(50, 5, BITE_DARK_GRAY.to_rgba());
    for y in 6..=7 {
        frame.put_pixel(50, y, BITE_WHITE.to_rgba());
    }
    for y in 8..=25 {
        frame.put_pixel(50, y, BITE_DARK_GRAY.to_rgba());
    }
    frame
}

fn fast_settings() -> Settings {
    let mut s = Settings::default();
    s.water_point = Some(Point::new(10, 10));
    s.area_box = Some(AREA);
    s.rod_select_delay = 0.0;
    s.cursor_anti_detect_delay = 0.0;
    s.cast_hold_duration = 0.0;
    s.scan_loop_delay = 0.0;
    s.recast_timeout = 5.0;
    s.max_recast_failures = 3;
    s.catch_grace_period = 0.05;
    s.fish_end_delay = 0.0;
    s.black_screen_threshold = 0.5;
    s.state_resend_interval = 10.0;
    s.gap_tolerance_multiplier = 2.0;
    s.kp = 0.9;
    s.kd = 0.3;
    s.pd_clamp = 1.0;
    s.auto_buy_common_bait = false;
    s.auto_select_top_bait = false;
    s.auto_store_devil_fruit = false;
    s
}

struct Harness {
    cycle: FishingCycle<Script>,
    recorder: Arc<Recorder>,
    signals: Arc<SharedSignals>,
    counters: Arc<RunCounters>,
    notifier: Arc<CountingNotifier>,
}

fn harness(settings: Settings, frames: Vec<RgbaImage>, fallback: RgbaImage) -> Harness {
    harness_with(settings, Script::new(frames, fallback), Arc::new(SharedSignals::new()))
}

fn harness_with(settings: Settings, script: Script, signals: Arc<SharedSignals>) -> Harness {
    let recorder = Arc::new(Recorder::default());
    let counters = Arc::new(RunCounters::new());
    let notifier = Arc::new(CountingNotifier::default());
    let controls = Controls::new(recorder.clone(), signals.clone());
    signals.set_running(true);

    let cycle = FishingCycle::new(
        script,
        controls,
        signals.clone(),
        Arc::new(RwLock::new(settings)),
        counters.clone(),
    )
    .with_notifier(notifier.clone());

    Harness {
        cycle,
        recorder,
        signals,
        counters,
        notifier,
    }
}

#[test]
fn test_bite_after_a_few_polls_resets_failures() {
    let s = fast_settings();
    let mut h = harness(s.clone(), vec![blank(), blank(), minigame()], blank());
    h.counters.record_recast_failure();
    h.counters.record_recast_failure();

    assert_eq!(h.cycle.waiting(&s).unwrap(), WaitOutcome::Bite);
    assert_eq!(h.counters.recast_failures(), 0);
    assert!(h.signals.is_running());

    // Cast: right click, hotbar keys, water point, then a button press and release
    let events = h.recorder.events();
    assert_eq!(events[0], Event::Button(MouseButton::Right, Action::Click));
    assert!(events.contains(&Event::Key("2".into(), Action::Click)));
    assert!(events.contains(&Event::Key("1".into(), Action::Click)));
    assert!(events.contains(&Event::Move(10, 10)));
    assert_eq!(h.recorder.left(), vec![Action::Press, Action::Release]);
}

#[test]
fn test_recast_timeouts_escalate_to_halt() {
    let mut s = fast_settings();
    s.recast_timeout = 0.05;
    s.max_recast_failures = 2;
    let mut h = harness(s.clone(), vec![], blank());

    assert_eq!(h.cycle.waiting(&s).unwrap(), WaitOutcome::Recast);
    assert!(h.signals.is_running());
    assert_eq!(h.counters.recast_failures(), 1);

    assert_eq!(h.cycle.waiting(&s).unwrap(), WaitOutcome::Halt);
    assert!(!h.signals.is_running());
    assert!(!h.signals.is_holding());
    assert_eq!(h.notifier.recast_failures.load(Ordering::SeqCst), 1);
}

#[test]
fn test_target_above_tracker_holds_button() {
    let s = fast_settings();
    let mut h = harness(s.clone(), vec![minigame(), minigame()], blank());

    assert_eq!(
        h.cycle.fishing(&s).unwrap(),
        FishOutcome::Caught
    );
    // Held while the bar was visible, released once the marker disappeared
    assert_eq!(h.recorder.left(), vec![Action::Press, Action::Release]);
    assert!(!h.signals.is_holding());
}

#[test]
fn test_black_screen_after_catch_is_cleared() {
    let s = fast_settings();
    let mut h = harness(s.clone(), vec![minigame()], black());

    h.cycle.fishing(&s).unwrap();
    let spaces = h
        .recorder
        .events()
        .into_iter()
        .filter(|e| *e == Event::Key("space".into(), Action::Click))
        .count();
    assert_eq!(spaces, 2);
}

#[test]
fn test_full_iteration_counts_the_catch() {
    let s = fast_settings();
    let mut h = harness(s.clone(), vec![minigame(), minigame(), minigame()], blank());
    h.signals.increment_recovery_count();
    h.counters.record_recast_failure();

    assert_eq!(h.cycle.run_once(&s).unwrap(), Iteration::Caught);
    assert_eq!(h.counters.fish_count(), 1);
    assert_eq!(h.counters.recast_failures(), 0);
    assert_eq!(h.signals.recovery_count(), 0);
    assert!(!h.signals.is_holding());
}

#[test]
fn test_legendary_fruit_is_stored_and_announced() {
    let mut s = fast_settings();
    s.auto_store_devil_fruit = true;
    s.store_fruit_point = Some(Point::new(300, 400));
    s.store_fruit_hotkey_delay = 0.0;
    s.store_fruit_click_delay = 0.0;
    s.store_fruit_shift_delay = 0.0;
    s.store_fruit_backspace_delay = 0.0;
    let mut h = harness(s.clone(), vec![], blank());
    h.cycle = h.cycle.with_scanner(Box::new(LegendaryDrop));

    h.cycle.post_catch(&s).unwrap();
    assert_eq!(h.counters.fish_count(), 1);
    assert_eq!(h.counters.fruit_count(), 1);
    assert_eq!(h.notifier.devil_fruits.load(Ordering::SeqCst), 1);

    let events = h.recorder.events();
    assert_eq!(events[0], Event::Key("3".into(), Action::Click));
    assert!(events.contains(&Event::Move(300, 400)));
    assert!(events.contains(&Event::Key("backspace".into(), Action::Click)));
}

#[test]
fn test_stopped_cycle_returns_immediately() {
    let s = fast_settings();
    let mut h = harness(s.clone(), vec![], blank());
    h.signals.set_running(false);
    h.cycle.run();
    assert!(h.recorder.events().is_empty());
}

/// Requests a watchdog restart on capture number `at`
fn restart_on_capture(
    frames: Vec<RgbaImage>,
    fallback: RgbaImage,
    at: usize,
) -> (Script, Arc<SharedSignals>) {
    let signals = Arc::new(SharedSignals::new());
    let mut script = Script::new(frames, fallback);
    let hook_signals = signals.clone();
    script.on_capture = Some(Box::new(move |n| {
        if n == at {
            hook_signals.request_restart();
        }
    }));
    (script, signals)
}

#[test]
fn test_purchase_sequence_order() {
    let mut s = fast_settings();
    s.auto_buy_common_bait = true;
    s.auto_craft_bait = false;
    s.loops_per_purchase = 3;
    s.left_point = Some(Point::new(1, 1));
    s.middle_point = Some(Point::new(2, 2));
    s.right_point = Some(Point::new(3, 3));
    s.pre_cast_e_delay = 0.0;
    s.pre_cast_click_delay = 0.0;
    s.pre_cast_type_delay = 0.0;
    s.pre_cast_anti_detect_delay = 0.0;
    let mut h = harness(s.clone(), vec![], blank());

    // Not due yet
    h.counters.set_bait_loops(2);
    assert!(h.cycle.pre_cast(&s).unwrap());
    assert!(h.recorder.events().is_empty());

    h.counters.set_bait_loops(3);
    assert!(h.cycle.pre_cast(&s).unwrap());
    assert_eq!(h.counters.bait_loops(), 0);
    assert_eq!(h.notifier.purchases.load(Ordering::SeqCst), 1);

    let click = |x, y| {
        vec![
            Event::Move(x, y),
            Event::Nudge,
            Event::Button(MouseButton::Left, Action::Click),
        ]
    };
    let mut expected = vec![Event::Key("e".into(), Action::Click)];
    expected.extend(click(1, 1));
    expected.extend(click(2, 2));
    expected.push(Event::Text("3".into()));
    expected.extend(click(1, 1));
    expected.extend(click(3, 3));
    expected.extend(click(2, 2));
    assert_eq!(h.recorder.events(), expected);
}

#[test]
fn test_restart_during_waiting_retries() {
    let s = fast_settings();
    let (script, signals) = restart_on_capture(vec![], blank(), 2);
    let mut h = harness_with(s.clone(), script, signals);

    assert_eq!(h.cycle.run_once(&s).unwrap(), Iteration::Retry);
    assert!(h.signals.restart_requested());
    assert!(h.signals.is_running());
    assert_eq!(h.counters.recast_failures(), 0);
    assert_eq!(h.counters.fish_count(), 0);
}

#[test]
fn test_restart_during_fishing_releases_and_retries() {
    let s = fast_settings();
    let (script, signals) = restart_on_capture(vec![minigame(); 10], minigame(), 4);
    let mut h = harness_with(s.clone(), script, signals);

    // Capture 1 is the bite, 2 and 3 hold the button, 4 asks for a restart
    assert_eq!(h.cycle.run_once(&s).unwrap(), Iteration::Retry);
    assert!(!h.signals.is_holding());
    assert_eq!(h.recorder.left().last(), Some(&Action::Release));
    assert_eq!(h.counters.fish_count(), 0);
}

#[test]
fn test_run_resumes_at_pre_cast_after_restart() {
    let mut s = fast_settings();
    s.recast_timeout = 0.05;
    s.max_recast_failures = 1;
    let (script, signals) = restart_on_capture(vec![], blank(), 1);
    let mut h = harness_with(s, script, signals);

    // First pass is cut short by the restart, the second times out and halts
    h.cycle.run();
    assert!(!h.signals.restart_requested());
    assert!(!h.signals.is_running());
    assert_eq!(h.counters.recast_failures(), 1);
    assert_eq!(h.notifier.recast_failures.load(Ordering::SeqCst), 1);
    assert_eq!(h.signals.current_state(), CycleState::Idle);

    let casts = h
        .recorder
        .events()
        .into_iter()
        .filter(|e| *e == Event::Button(MouseButton::Right, Action::Click))
        .count();
    assert_eq!(casts, 2);
}

#[test]
fn test_marker_inside_grace_window_resets_it() {
    let mut s = fast_settings();
    s.scan_loop_delay = 0.05;
    s.catch_grace_period = 0.2;
    let frames = vec![minigame(), blank(), blank(), blank(), minigame()];
    let mut h = harness(s.clone(), frames, blank());

    let started = Instant::now();
    assert_eq!(h.cycle.fishing(&s).unwrap(), FishOutcome::Caught);
    // Four pauses before the marker returns, then a full grace period after it
    assert!(started.elapsed() >= Duration::from_millis(400));
    assert_eq!(
        h.recorder.left(),
        vec![Action::Press, Action::Release, Action::Press, Action::Release]
    );
}

#[test]
fn test_stop_during_bait_selection_ends_crafting() {
    let mut s = fast_settings();
    s.auto_craft_bait = true;
    s.craft_leg_bait = true;
    s.craft_rare_bait = true;
    s.leg_bait_point = Some(Point::new(70, 70));
    s.rare_bait_point = Some(Point::new(80, 80));
    s.craft_point_1 = Some(Point::new(11, 11));
    s.craft_point_2 = Some(Point::new(12, 12));
    s.craft_point_3 = Some(Point::new(13, 13));
    s.craft_point_4 = Some(Point::new(14, 14));
    s.left_point = Some(Point::new(1, 1));
    s.middle_point = Some(Point::new(2, 2));
    s.craft_nav_duration_1 = 0.0;
    s.craft_nav_duration_2 = 0.0;
    s.craft_nav_wait_delay = 0.0;
    s.craft_t_press_delay = 0.0;
    s.craft_click_delay = 0.0;
    let mut h = harness(s.clone(), vec![], blank());
    *h.recorder.stop_at.lock() = Some((70, 70, h.signals.clone()));

    assert!(!h.cycle.craft_bait(&s).unwrap());
    assert_eq!(h.signals.current_state(), CycleState::PreCast);

    let events = h.recorder.events();
    assert!(events.contains(&Event::Move(70, 70)));
    assert!(!events.contains(&Event::Move(11, 11)));
    assert!(!events.contains(&Event::Move(80, 80)));
}
