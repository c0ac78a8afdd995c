//! Demonstration of a protected session under the engine.
//!
//! This example shows how to:
//! 1. Build an engine for a security level with overrides
//! 2. Attach detection hooks and an in-memory surface
//! 3. Feed timestamped host events and read the dispositions
//! 4. Render the presentation state and unlock the session
//! 5. Take a session snapshot
//!
//! Run with: cargo run --example session_demo

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{Duration, Utc};
use tamper_guard::{
    core::{PartialPolicy, SecurityEngine, SnapshotBuilder},
    detector::{ClipboardAction, HostEvent, Viewport},
    presentation::MemorySurface,
    EventLabel, DISCLAIMER,
};

fn main() {
    println!("tamper-guard - Session Demo");
    println!("===========================");
    println!();
    println!("{DISCLAIMER}");
    println!();

    let mut overrides = PartialPolicy::default();
    if let Err(e) = overrides.set_pair("watermarkText=\"Internal Review\"") {
        eprintln!("Error: {e}");
        return;
    }

    let surface = Rc::new(RefCell::new(MemorySurface::default()));
    let detections = Rc::new(RefCell::new(Vec::new()));
    let seen = detections.clone();

    let mut engine = SecurityEngine::builder("medium", overrides)
        .viewport(Viewport::square(1440, 900))
        .surface(surface.clone())
        .on_detect(move |label: EventLabel| {
            seen.borrow_mut().push(label);
            Ok(())
        })
        .build();

    println!("Level: {}", engine.level());
    println!("Active detectors: {:?}", engine.active_detectors());
    if let Some(watermark) = surface.borrow().watermark.as_ref() {
        println!("Watermark: {} ({:?})", watermark.text, watermark.position);
    }
    println!();

    let start = Utc::now();
    let at = |ms: i64| start + Duration::milliseconds(ms);

    // Someone types normally, then copies, then hits PrintScreen
    let script = vec![
        HostEvent::key_down("h", at(0)),
        HostEvent::key_up("h", at(80)),
        HostEvent::key_down("i", at(210)),
        HostEvent::key_up("i", at(290)),
        HostEvent::Clipboard {
            action: ClipboardAction::Copy,
            at: at(1_000),
        },
        HostEvent::key_down("PrintScreen", at(2_000)),
        HostEvent::Tick { at: at(2_100) },
    ];

    for event in &script {
        let disposition = engine.dispatch(event);
        println!(
            "{:<14} prevent_default={:<5} clear_clipboard={}",
            event_name(event),
            disposition.prevent_default,
            disposition.clear_clipboard
        );
    }
    println!();

    println!("Detections: {:?}", detections.borrow());
    let view = engine.presentation();
    println!("Blurred: {}", view.blur);
    println!("Lock overlay: {}", view.lock_overlay);
    if let Some(message) = &view.lock_message {
        println!("Lock message: {message}");
    }
    if let Some(badge) = &view.badge_text {
        println!("Badge: {badge}");
    }
    println!();

    println!("Unlocking...");
    engine.unlock();
    let state = engine.state();
    println!(
        "Suspicious: {}, locked: {}, last event: {:?}",
        state.suspicious(),
        state.locked(),
        state.last_event()
    );
    println!("Watermark after unlock: {:?}", surface.borrow().watermark);
    println!();

    let snapshot = engine.snapshot(&SnapshotBuilder::new().with_session_id("demo"));
    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => println!("Snapshot:\n{json}"),
        Err(e) => eprintln!("Error serializing snapshot: {e}"),
    }
    println!();

    engine.dispose();
    println!("{}", engine.audit().summary());
}

fn event_name(event: &HostEvent) -> String {
    match event {
        HostEvent::KeyDown { key, .. } => format!("key_down {key}"),
        HostEvent::KeyUp { key, .. } => format!("key_up {key}"),
        HostEvent::Clipboard { action, .. } => format!("{action:?}").to_lowercase(),
        HostEvent::Tick { .. } => "tick".to_string(),
        other => format!("{other:?}"),
    }
}
