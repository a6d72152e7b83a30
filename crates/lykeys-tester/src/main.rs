//! LyKeys tester entry point.
//!
//! Wires the platform adapters into a [`Console`] and runs the control loop
//! on the Tokio runtime.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  ├─ load_config()            -- settings file, lenient
//!  ├─ stdin thread             -- one ControlEvent::Command per line
//!  ├─ ctrl-c task              -- ControlEvent::Shutdown
//!  └─ control loop             -- Console::handle for every event
//!       ├─ DriverSession       (WindowsDriverLoader, ShellElevation)
//!       ├─ HotkeyListener      (WH_KEYBOARD_LL thread)
//!       └─ workers             (one OS thread per injection sequence)
//! ```

use std::io::BufRead;

use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lykeys_tester::application::driver_session::DriverSession;
use lykeys_tester::application::workers::ControlEvent;
use lykeys_tester::infrastructure::input_capture::{platform_hook, HotkeyListener};
use lykeys_tester::infrastructure::storage::config::{load_config, AppConfig};
use lykeys_tester::infrastructure::ui_bridge::{Console, Flow};
use lykeys_tester::infrastructure::{driver, elevation, screen};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, config_warning) = match load_config() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.log_level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Some(e) = config_warning {
        warn!(error = %e, "could not load settings; using defaults");
    }
    info!(version = env!("CARGO_PKG_VERSION"), "LyKeys tester starting");

    let (tx, mut rx) = unbounded_channel();

    // ── Operator input ────────────────────────────────────────────────────────
    // A plain thread: a blocking stdin read would hold up runtime shutdown.
    spawn_stdin_reader(tx.clone())?;

    // ── Ctrl-C handler ───────────────────────────────────────────────────────
    let signal_tx = tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = signal_tx.send(ControlEvent::Shutdown);
        }
    });

    let session = DriverSession::new(driver::platform_loader(), elevation::platform_broker());
    let listener = HotkeyListener::new(platform_hook());
    let mut console = Console::new(session, listener, screen::platform_metrics(), config, tx);

    println!("LyKeys tester ready. Type `help` for commands.");

    while let Some(event) = rx.recv().await {
        let (flow, reply) = console.handle(event);
        if let Some(reply) = reply {
            if reply.success {
                println!("{}", reply.message);
            } else {
                println!("error: {}", reply.message);
            }
        }
        match flow {
            Flow::Continue => {}
            Flow::Exit => break,
            Flow::Restart => {
                info!("exiting so the elevated instance can take over");
                break;
            }
        }
    }

    console.shutdown();
    info!("LyKeys tester stopped");
    Ok(())
}

fn spawn_stdin_reader(tx: UnboundedSender<ControlEvent>) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("lykeys-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(ControlEvent::Command(line)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "reading stdin failed");
                        break;
                    }
                }
            }
            // EOF behaves like `quit`.
            let _ = tx.send(ControlEvent::Shutdown);
        })?;
    Ok(())
}
