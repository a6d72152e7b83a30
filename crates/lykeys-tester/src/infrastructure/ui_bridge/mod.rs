//! Console bridge: turns operator commands into application-layer calls.
//!
//! The graphical control surface of the original tool is replaced by a line
//! console, but the contract is the same: every operator action arrives as a
//! [`ControlEvent`] on the control thread, and every answer goes back as a
//! [`CommandResult`].  [`Console::handle`] is the single writer of the
//! [`ConsoleStatus`] record; workers and the hotkey callback only ever send
//! messages.
//!
//! # Ownership
//!
//! ```text
//! Console
//!  ├─ DriverSession      (sole owner of the driver handle)
//!  ├─ HotkeyListener     (capture thread; hotkey → ControlEvent::HotkeyTriggered)
//!  ├─ WorkerHandle       (at most one: it holds the injector lease)
//!  └─ AppConfig          (written back on `save`)
//! ```
//!
//! # `CommandResult` wrapper
//!
//! Every handled event yields a `CommandResult` with the same shape:
//! `{ success, message }`.  The binary prints them; a GUI front end would
//! render them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use lykeys_core::keymap::KeyCatalog;
use lykeys_core::timing::strokes::DEFAULT_HOLD;
use lykeys_core::timing::{CyclicPress, PressStatus};
use lykeys_core::{HotkeyBinding, InjectError, RunFlag, RunOutcome};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::application::command::{self, Command, RapidArgs};
use crate::application::driver_session::{
    DriverSession, ErrorCategory, InitOutcome, SessionError,
};
use crate::application::input_translator::InputTranslator;
use crate::application::workers::{
    motion_job, rapid_press_job, sequence_job, spawn_worker, ControlEvent, MotionPlan, Sequence,
    WorkerHandle, WorkerKind, WorkerReport,
};
use crate::infrastructure::input_capture::HotkeyListener;
use crate::infrastructure::screen::ScreenMetrics;
use crate::infrastructure::storage::config::{save_config, save_config_to, AppConfig, RapidTestConfig};

// ── Results ───────────────────────────────────────────────────────────────────

/// Unified response for one handled event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub message: String,
}

impl CommandResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    fn session(err: &SessionError) -> Self {
        Self::err(format!("[{}] {err}", err.category()))
    }

    fn inject(err: &InjectError) -> Self {
        Self::err(format!("[{}] {err}", ErrorCategory::of_inject(err)))
    }
}

/// What the control loop should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Ordered shutdown has run; exit normally.
    Exit,
    /// An elevated copy was launched; exit without further cleanup.
    Restart,
}

/// Display record for the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleStatus {
    pub session: String,
    pub listener_running: bool,
    /// Kind of the running worker, if any.
    pub worker: Option<String>,
    pub presses: u64,
    pub elapsed_s: f64,
    /// Presses per second.
    pub rate: f64,
}

impl Default for ConsoleStatus {
    fn default() -> Self {
        Self {
            session: "uninitialized".to_string(),
            listener_running: false,
            worker: None,
            presses: 0,
            elapsed_s: 0.0,
            rate: 0.0,
        }
    }
}

// ── Console ───────────────────────────────────────────────────────────────────

pub struct Console {
    session: DriverSession,
    listener: HotkeyListener,
    screen: Box<dyn ScreenMetrics>,
    config: AppConfig,
    /// Explicit save location; `None` uses the platform default.
    config_path: Option<PathBuf>,
    events: UnboundedSender<ControlEvent>,
    status: ConsoleStatus,
    worker: Option<WorkerHandle>,
    next_worker_id: u64,
}

impl Console {
    pub fn new(
        session: DriverSession,
        listener: HotkeyListener,
        screen: Box<dyn ScreenMetrics>,
        config: AppConfig,
        events: UnboundedSender<ControlEvent>,
    ) -> Self {
        let mut console = Self {
            session,
            listener,
            screen,
            config,
            config_path: None,
            events,
            status: ConsoleStatus::default(),
            worker: None,
            next_worker_id: 1,
        };
        console.refresh_status();
        console
    }

    /// Saves to `path` instead of the platform default.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn status(&self) -> &ConsoleStatus {
        &self.status
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session(&self) -> &DriverSession {
        &self.session
    }

    /// Handles one control event.
    pub fn handle(&mut self, event: ControlEvent) -> (Flow, Option<CommandResult>) {
        let outcome = match event {
            ControlEvent::Command(line) => match line.parse::<Command>() {
                Ok(command) => self.execute(command),
                Err(command::CommandError::Empty) => (Flow::Continue, None),
                Err(e) => (Flow::Continue, Some(CommandResult::err(e.to_string()))),
            },
            ControlEvent::HotkeyTriggered => (Flow::Continue, Some(self.toggle_auto_move())),
            ControlEvent::PressProgress(status) => (Flow::Continue, self.on_progress(status)),
            ControlEvent::WorkerFinished { id, kind, result } => {
                (Flow::Continue, self.on_worker_finished(id, kind, result))
            }
            ControlEvent::Shutdown => {
                self.shutdown();
                (Flow::Exit, Some(CommandResult::ok("shut down")))
            }
        };
        self.refresh_status();
        outcome
    }

    /// Stops workers, then the listener, then the session.  Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            info!(kind = %worker.kind(), "stopping worker for shutdown");
            worker.stop();
        }
        if let Err(e) = self.listener.stop() {
            warn!(error = %e, "hotkey listener did not stop cleanly");
        }
        self.session.cleanup();
        self.refresh_status();
    }

    // ── Commands ────────────────────────────────────────────────────────────

    fn execute(&mut self, command: Command) -> (Flow, Option<CommandResult>) {
        let result = match command {
            Command::Load => match self.load() {
                Ok(InitOutcome::Ready) => CommandResult::ok("driver ready"),
                Ok(InitOutcome::Restarting) => {
                    return (
                        Flow::Restart,
                        Some(CommandResult::ok("relaunching with administrator rights")),
                    )
                }
                Err(e) => CommandResult::session(&e),
            },
            Command::Unload => {
                self.stop_worker();
                self.session.unload();
                CommandResult::ok("driver unloaded")
            }
            Command::Paths { dll, sys } => match self.session.configure_paths(&dll, &sys) {
                Ok(()) => {
                    self.config.driver.dll_path = Some(dll);
                    self.config.driver.sys_path = Some(sys);
                    CommandResult::ok("driver paths set")
                }
                Err(e) => CommandResult::session(&e),
            },
            Command::Status => self.report_status(),
            Command::Press { key, hold } => self.start_sequence(Sequence::Press {
                key,
                hold: hold.unwrap_or(DEFAULT_HOLD),
            }),
            Command::Type(text) => self.start_sequence(Sequence::Type(text)),
            Command::Click(button) => self.start_sequence(Sequence::Click(button)),
            Command::Wheel(delta) => self.start_sequence(Sequence::Wheel(delta)),
            Command::Demo(demo) => {
                let screen = self.screen.screen_size().ok();
                self.start_sequence(Sequence::Demo { demo, screen })
            }
            Command::Rapid(args) => self.toggle_rapid(args),
            Command::GlideRelative { dx, dy } => self.start_motion(MotionPlan::Relative { dx, dy }),
            Command::GlideAbsolute { x, y } => match self.screen.cursor_position() {
                Ok(from) => self.start_motion(MotionPlan::Absolute { from, to: (x, y) }),
                Err(e) => CommandResult::err(format!("cannot read cursor position: {e}")),
            },
            Command::Corner(corner) => match self.screen.screen_size() {
                Ok(size) => self.start_motion(MotionPlan::corner(corner, size)),
                Err(e) => CommandResult::err(format!("cannot read screen size: {e}")),
            },
            Command::Hook => self.toggle_listener(),
            Command::Stop => match &self.worker {
                Some(worker) => {
                    worker.cancel();
                    CommandResult::ok(format!("stopping {}", worker.kind()))
                }
                None => CommandResult::ok("nothing running"),
            },
            Command::Save => self.save(),
            Command::Help => CommandResult::ok(command::HELP),
            Command::Quit => {
                self.shutdown();
                return (Flow::Exit, Some(CommandResult::ok("bye")));
            }
        };
        (Flow::Continue, Some(result))
    }

    fn load(&mut self) -> Result<InitOutcome, SessionError> {
        if self.session.paths().is_none() {
            if let (Some(dll), Some(sys)) = (
                self.config.driver.dll_path.clone(),
                self.config.driver.sys_path.clone(),
            ) {
                self.session.configure_paths(dll, sys)?;
            }
        }
        self.session.initialize()
    }

    fn report_status(&self) -> CommandResult {
        let mut text = format!("session: {}", self.session.state());
        if self.session.is_ready() {
            match self.session.driver_status() {
                Ok(status) => text.push_str(&format!(", device: {status}")),
                Err(e) => return CommandResult::session(&e),
            }
            if let Ok(tick) = self.session.last_check_time() {
                text.push_str(&format!(", last check: {tick}"));
            }
        }
        text.push_str(&format!(
            ", hotkeys: {}",
            if self.listener.is_running() { "on" } else { "off" }
        ));
        if let Some(worker) = &self.worker {
            text.push_str(&format!(", running: {}", worker.kind()));
        }
        CommandResult::ok(text)
    }

    fn save(&self) -> CommandResult {
        let saved = match &self.config_path {
            Some(path) => save_config_to(path, &self.config).map(|()| path.clone()),
            None => save_config(&self.config),
        };
        match saved {
            Ok(path) => CommandResult::ok(format!("settings saved to {}", path.display())),
            Err(e) => CommandResult::err(format!("[configuration] {e}")),
        }
    }

    // ── Workers ─────────────────────────────────────────────────────────────

    fn toggle_rapid(&mut self, args: Option<RapidArgs>) -> CommandResult {
        if self.running(WorkerKind::RapidPress) {
            self.stop_worker();
            return CommandResult::ok("rapid press stopped");
        }
        // Overrides replace the saved settings only once the press is running.
        let settings = match args {
            Some(args) => RapidTestConfig {
                test_key: args.key,
                press_ms: args.press_ms,
                interval_ms: args.interval_ms,
                duration_s: args.duration_s,
            },
            None => self.config.rapid_test.clone(),
        };
        let Some(key) = KeyCatalog::resolve(&settings.test_key) else {
            return CommandResult::err(format!(
                "[{}] unknown test key {:?}",
                ErrorCategory::Configuration,
                settings.test_key
            ));
        };
        let press = CyclicPress::new(
            key,
            Duration::from_millis(settings.press_ms),
            Duration::from_millis(settings.interval_ms),
        )
        .with_duration(Duration::from_secs(settings.duration_s));
        let reply = self.start_worker(WorkerKind::RapidPress, rapid_press_job(press));
        if reply.success {
            self.config.rapid_test = settings;
            self.status.presses = 0;
            self.status.elapsed_s = 0.0;
            self.status.rate = 0.0;
        }
        reply
    }

    fn start_motion(&mut self, plan: MotionPlan) -> CommandResult {
        self.start_worker(WorkerKind::Motion, motion_job(plan))
    }

    fn start_sequence(&mut self, sequence: Sequence) -> CommandResult {
        self.start_worker(WorkerKind::Sequence, sequence_job(sequence))
    }

    fn toggle_auto_move(&mut self) -> CommandResult {
        if self.running(WorkerKind::AutoMove) {
            self.stop_worker();
            return CommandResult::ok("auto move stopped");
        }
        let center = match self.screen.cursor_position() {
            Ok(center) => center,
            Err(e) => return CommandResult::err(format!("cannot read cursor position: {e}")),
        };
        let plan = MotionPlan::Orbit {
            center,
            speed: self.config.auto_move.speed,
            range: self.config.auto_move.range,
        };
        self.start_worker(WorkerKind::AutoMove, motion_job(plan))
    }

    fn start_worker<F>(&mut self, kind: WorkerKind, job: F) -> CommandResult
    where
        F: FnOnce(&mut InputTranslator, &RunFlag, &UnboundedSender<ControlEvent>) -> Result<WorkerReport, InjectError>
            + Send
            + 'static,
    {
        let lease = match self.session.acquire_injector() {
            Ok(lease) => lease,
            Err(e) => return CommandResult::session(&e),
        };
        let id = self.next_worker_id;
        self.next_worker_id += 1;
        match spawn_worker(id, kind, InputTranslator::new(lease), self.events.clone(), job) {
            Ok(handle) => {
                // A finished worker may not have been reaped yet.
                if let Some(previous) = self.worker.replace(handle) {
                    previous.stop();
                }
                info!(id, %kind, "worker started");
                CommandResult::ok(format!("{kind} started"))
            }
            Err(e) => CommandResult::err(format!("failed to start {kind}: {e}")),
        }
    }

    fn running(&self, kind: WorkerKind) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| w.kind() == kind && !w.is_finished())
    }

    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop();
        }
    }

    fn on_progress(&mut self, status: PressStatus) -> Option<CommandResult> {
        self.status.presses = status.presses;
        self.status.elapsed_s = status.elapsed.as_secs_f64();
        self.status.rate = status.rate;
        if status.finished {
            return None;
        }
        Some(CommandResult::ok(format!(
            "presses: {} in {:.1} s ({:.1}/s)",
            status.presses,
            status.elapsed.as_secs_f64(),
            status.rate
        )))
    }

    fn on_worker_finished(
        &mut self,
        id: u64,
        kind: WorkerKind,
        result: Result<WorkerReport, InjectError>,
    ) -> Option<CommandResult> {
        if self.worker.as_ref().is_some_and(|w| w.id() == id) {
            self.stop_worker();
        }
        let reply = match result {
            Ok(WorkerReport::Press(report)) => CommandResult::ok(format!(
                "rapid press {}: {} presses in {:.3} s ({:.1}/s)",
                outcome_text(report.outcome),
                report.presses,
                report.elapsed.as_secs_f64(),
                report.rate()
            )),
            Ok(WorkerReport::Motion(report)) => CommandResult::ok(format!(
                "{kind} {} after {} moves",
                outcome_text(report.outcome),
                report.emitted
            )),
            Ok(WorkerReport::Sequence(outcome)) => {
                CommandResult::ok(format!("{kind} {}", outcome_text(outcome)))
            }
            Err(e) => CommandResult::inject(&e),
        };
        Some(reply)
    }

    // ── Hotkeys ─────────────────────────────────────────────────────────────

    fn toggle_listener(&mut self) -> CommandResult {
        if self.listener.is_running() {
            if self.running(WorkerKind::AutoMove) {
                self.stop_worker();
            }
            return match self.listener.stop() {
                Ok(()) => CommandResult::ok("hotkeys off"),
                Err(e) => CommandResult::err(format!("[hook] {e}")),
            };
        }
        let binding = match HotkeyBinding::parse(&self.config.auto_move.hotkey) {
            Ok(binding) => binding,
            Err(e) => {
                return CommandResult::err(format!(
                    "[{}] auto move hotkey {:?}: {e}",
                    ErrorCategory::Configuration,
                    self.config.auto_move.hotkey
                ))
            }
        };
        let events = self.events.clone();
        self.listener.register(
            binding.clone(),
            Arc::new(move || {
                let _ = events.send(ControlEvent::HotkeyTriggered);
            }),
        );
        match self.listener.start() {
            Ok(()) => CommandResult::ok(format!("hotkeys on; {binding} toggles auto move")),
            Err(e) => CommandResult::err(format!("[hook] {e}")),
        }
    }

    fn refresh_status(&mut self) {
        self.status.session = self.session.state().to_string();
        self.status.listener_running = self.listener.is_running();
        self.status.worker = self
            .worker
            .as_ref()
            .filter(|w| !w.is_finished())
            .map(|w| w.kind().to_string());
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn outcome_text(outcome: RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::Completed => "completed",
        RunOutcome::Cancelled => "cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::driver::mock::{MockDriver, MockDriverLoader};
    use crate::infrastructure::elevation::mock::MockElevation;
    use crate::infrastructure::input_capture::mock::MockCaptureHook;
    use crate::infrastructure::screen::mock::MockScreen;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
    use uuid::Uuid;

    struct Fixture {
        dir: PathBuf,
        driver: Arc<MockDriver>,
        console: Console,
        rx: UnboundedReceiver<ControlEvent>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("lykeys_console_{}", Uuid::new_v4()));
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("lykeysdll.dll"), b"dll").unwrap();
            std::fs::write(dir.join("lykeys.sys"), b"sys").unwrap();

            let driver = Arc::new(MockDriver::new());
            let session = DriverSession::new(
                Box::new(MockDriverLoader::new(Arc::clone(&driver))),
                Box::new(MockElevation::elevated()),
            );
            let listener = HotkeyListener::new(Arc::new(MockCaptureHook::new()));
            let mut config = AppConfig::default();
            config.driver.dll_path = Some(dir.join("lykeysdll.dll"));
            config.driver.sys_path = Some(dir.join("lykeys.sys"));
            let (tx, rx) = unbounded_channel();
            let console = Console::new(session, listener, Box::new(MockScreen::default()), config, tx)
                .with_config_path(dir.join("config.toml"));
            Self {
                dir,
                driver,
                console,
                rx,
            }
        }

        fn run(&mut self, line: &str) -> CommandResult {
            self.console
                .handle(ControlEvent::Command(line.to_string()))
                .1
                .unwrap()
        }

        /// Feeds worker events back until the worker finishes.
        fn finish_worker(&mut self) -> CommandResult {
            loop {
                let event = self.rx.blocking_recv().unwrap();
                let finished = matches!(event, ControlEvent::WorkerFinished { .. });
                let (_, reply) = self.console.handle(event);
                if finished {
                    return reply.unwrap();
                }
            }
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            std::fs::remove_dir_all(&self.dir).ok();
        }
    }

    #[test]
    fn test_load_uses_configured_paths() {
        // Arrange
        let mut fx = Fixture::new();

        // Act
        let reply = fx.run("load");

        // Assert
        assert!(reply.success, "{reply:?}");
        assert!(fx.console.session().is_ready());
        assert_eq!(fx.console.status().session, "ready");
    }

    #[test]
    fn test_commands_before_load_report_session_error() {
        let mut fx = Fixture::new();

        let reply = fx.run("press a");

        assert!(!reply.success);
        assert!(reply.message.starts_with("[session]"), "{}", reply.message);
    }

    #[test]
    fn test_press_runs_on_worker_and_reports_completion() {
        // Arrange
        let mut fx = Fixture::new();
        fx.run("load");

        // Act
        let started = fx.run("press a 1");
        let finished = fx.finish_worker();

        // Assert
        assert!(started.success);
        assert!(finished.success, "{finished:?}");
        assert_eq!(fx.driver.count("KeyDown"), 1);
        assert_eq!(fx.driver.count("KeyUp"), 1);
        assert!(fx.console.status().worker.is_none());
    }

    #[test]
    fn test_second_worker_is_rejected_while_first_holds_lease() {
        let mut fx = Fixture::new();
        fx.run("load");
        fx.run("rapid");

        let second = fx.run("glide rel 10 10");

        assert!(!second.success);
        assert!(second.message.contains("already injecting"), "{}", second.message);
        fx.run("stop");
        fx.finish_worker();
    }

    #[test]
    fn test_rapid_toggles_and_reports_progress() {
        // Arrange
        let mut fx = Fixture::new();
        fx.run("load");

        // Act
        let started = fx.run("rapid b 1 1 1");
        let finished = fx.finish_worker();

        // Assert
        assert!(started.success);
        assert!(finished.message.starts_with("rapid press completed"), "{}", finished.message);
        assert_eq!(fx.console.config().rapid_test.test_key, "b");
        assert!(fx.console.status().presses > 0);
    }

    #[test]
    fn test_rapid_with_unresolvable_key_keeps_saved_settings() {
        // Arrange
        let mut fx = Fixture::new();
        fx.run("load");
        let before = fx.console.config().rapid_test.clone();

        // Act
        let reply = fx.console.toggle_rapid(Some(RapidArgs {
            key: "nosuchkey".to_string(),
            press_ms: 9,
            interval_ms: 9,
            duration_s: 9,
        }));

        // Assert
        assert!(!reply.success);
        assert!(reply.message.starts_with("[configuration]"), "{}", reply.message);
        assert_eq!(fx.console.config().rapid_test, before);
        assert!(fx.console.status().worker.is_none());
    }

    #[test]
    fn test_rapid_rejected_before_load_keeps_saved_settings() {
        let mut fx = Fixture::new();
        let before = fx.console.config().rapid_test.clone();

        let reply = fx.run("rapid x 3 7 1");

        assert!(!reply.success);
        assert!(reply.message.starts_with("[session]"), "{}", reply.message);
        assert_eq!(fx.console.config().rapid_test, before);
    }

    #[test]
    fn test_device_fault_is_reported_as_device_error() {
        let mut fx = Fixture::new();
        fx.run("load");
        fx.driver.set_status(2);

        fx.run("click left");
        let finished = fx.finish_worker();

        assert!(!finished.success);
        assert!(finished.message.starts_with("[device]"), "{}", finished.message);
        assert!(fx.console.session().is_ready());
    }

    #[test]
    fn test_corner_moves_to_screen_corner() {
        let mut fx = Fixture::new();
        fx.run("load");

        fx.run("corner tr");
        fx.finish_worker();

        let moves: Vec<_> = fx
            .driver
            .recorded()
            .into_iter()
            .filter(|c| c.export == "MouseMoveABSOLUTE")
            .collect();
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].args, vec![1919, 1]);
    }

    #[test]
    fn test_hotkey_toggles_auto_move() {
        // Arrange
        let mut fx = Fixture::new();
        fx.run("load");
        assert!(fx.run("hook").success);

        // Act
        let (_, on) = fx.console.handle(ControlEvent::HotkeyTriggered);
        std::thread::sleep(Duration::from_millis(50));
        let (_, off) = fx.console.handle(ControlEvent::HotkeyTriggered);
        let finished = fx.finish_worker();

        // Assert
        assert_eq!(on.unwrap().message, "auto move started");
        assert_eq!(off.unwrap().message, "auto move stopped");
        assert!(finished.message.starts_with("auto move cancelled"), "{}", finished.message);
        assert!(fx.driver.count("MouseMoveRELATIVE") > 0);
    }

    #[test]
    fn test_save_writes_config_file() {
        let mut fx = Fixture::new();

        let reply = fx.run("save");

        assert!(reply.success, "{reply:?}");
        assert!(fx.dir.join("config.toml").is_file());
    }

    #[test]
    fn test_unknown_command_and_quit() {
        let mut fx = Fixture::new();
        fx.run("load");

        let unknown = fx.run("dance");
        let (flow, _) = fx.console.handle(ControlEvent::Command("quit".to_string()));

        assert!(!unknown.success);
        assert_eq!(flow, Flow::Exit);
        assert!(!fx.console.session().is_ready());
    }
}
