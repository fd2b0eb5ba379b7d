//! # Console Kiosk
//!
//! Drives the terminal controller from standard input, for headless terminals
//! and for trying the server out without a browser.
//!
//! ## Input
//! - digits: typed into the passkey buffer
//! - `<` backspace, `c` clear, `s` submit, `b` biometric, `d` dismiss
//!
//! Several keys may be entered on one line. This terminal has no biometric
//! reader, so `b` always ends in a cancellation message.

use anyhow::Context;
use kiosk_checkin::kiosk::controller::{self, KioskEvent, KioskState, KioskView};
use kiosk_checkin::kiosk::ticker;
use kiosk_checkin::kiosk::{HttpKioskApi, KioskApi, KioskConfig, NoAuthenticator};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn key_to_event(key: char) -> Option<KioskEvent> {
    match key {
        '0'..='9' => Some(KioskEvent::Digit(key)),
        '<' => Some(KioskEvent::Backspace),
        'c' => Some(KioskEvent::Clear),
        's' => Some(KioskEvent::Submit),
        'b' => Some(KioskEvent::Biometric),
        'd' => Some(KioskEvent::Dismiss),
        _ => None,
    }
}

fn render(view: &KioskView, clock: &str, banner: &str) -> String {
    let masked: String = view.buffer.chars().map(|_| '•').collect();
    let body = match &view.state {
        KioskState::Idle => format!("Passkey: [{:<6}]", masked),
        KioskState::Loading => "Checking…".to_string(),
        KioskState::Success(outcome) => format!(
            "{}: {:?} ({}) at {}",
            outcome.student.name, outcome.action, outcome.schedule.title, outcome.timestamp
        ),
        KioskState::Error(message) => format!("Error: {}", message),
    };
    format!("[{}] {} | {}", clock, banner, body)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,kiosk_checkin=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = KioskConfig::from_env()?;
    tracing::info!("Kiosk configuration loaded: {:?}", config);

    let api: Arc<dyn KioskApi> = Arc::new(HttpKioskApi::new(&config).context("building HTTP client")?);
    let wall_clock = ticker::clock(config.clock_tick);
    let banner = ticker::schedule_banner(Arc::clone(&api), config.schedule_refresh);

    let handle = controller::spawn(config.clone(), api, Arc::new(NoAuthenticator));

    let mut view_rx = handle.view();
    let clock_rx = wall_clock.subscribe();
    let banner_rx = banner.subscribe();
    let location = config.location.clone();
    let printer = tokio::spawn(async move {
        loop {
            let line = {
                let view = view_rx.borrow_and_update();
                let clock = clock_rx.borrow().format("%H:%M:%S").to_string();
                let banner = match &*banner_rx.borrow() {
                    Some(schedule) => format!("{} · {}", location, schedule.title),
                    None => format!("{} · no class", location),
                };
                render(&view, &clock, &banner)
            };
            println!("{}", line);
            if view_rx.changed().await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        for event in line.trim().chars().filter_map(key_to_event) {
            handle.send(event).await?;
        }
    }

    printer.abort();
    banner.stop();
    wall_clock.stop();
    handle.shutdown();

    Ok(())
}
