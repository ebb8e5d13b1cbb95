//! Demonstration of a simulated study session.
//!
//! This example shows how to:
//! 1. Drive a focus monitor against a manual clock
//! 2. Watch state transitions and nudges as they happen
//! 3. Recompute session statistics from the timeline
//! 4. Print the session summary and transparency counters
//!
//! Run with: cargo run --example simulate_demo
//!
//! No camera is needed; frames come from a synthetic source and an hour of
//! session time passes in well under a second.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use study_companion::{
    clock::ManualClock,
    core::{format_duration, NudgePolicy},
    detection::{CameraConfig, DetectionService, FocusState, SyntheticCamera},
    monitor::{FocusMonitor, TickReport},
    session::create_shared_store,
    transparency::create_shared_log,
    PRIVACY_DECLARATION,
};

const SESSION_MINUTES: i64 = 60;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    println!("Study Companion - Simulated Session Demo");
    println!("========================================");
    println!();

    // Display privacy declaration
    println!("{PRIVACY_DECLARATION}");
    println!();

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = create_shared_store(clock.clone());
    let detector = DetectionService::with_seed(clock.clone(), 2024)
        .with_processing_delay(Duration::ZERO);
    let camera = Box::new(SyntheticCamera::new(CameraConfig::default(), clock.clone()));
    let transparency = create_shared_log();

    let monitor = match FocusMonitor::start(
        store,
        Arc::new(detector),
        camera,
        NudgePolicy::default(),
    )
    .await
    {
        Ok(monitor) => monitor.with_transparency(transparency.clone()),
        Err(e) => {
            eprintln!("Error starting monitor: {e}");
            return;
        }
    };

    println!("Simulating {SESSION_MINUTES} minutes, one frame per second...");
    println!();

    for second in 1..=SESSION_MINUTES * 60 {
        clock.advance(chrono::Duration::seconds(1));

        match monitor.tick().await {
            Ok(TickReport::Detected {
                sample,
                event: Some(_),
                nudge,
            }) => {
                // Only print the first few minutes in detail.
                if second <= 120 {
                    println!(
                        "[{:>5}s] {:<10} ({:.0}%)",
                        second,
                        sample.state,
                        sample.confidence * 100.0
                    );
                    if let Some(nudge) = nudge {
                        println!("         {} - {}", nudge.title, nudge.message);
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("Detection failed: {e}");
                return;
            }
        }

        if second % 600 == 0 {
            if let Ok(session) = monitor.refresh_stats().await {
                println!(
                    "-- {} elapsed, focus score {}% --",
                    format_duration(session.total_duration),
                    session.focus_score
                );
            }
        }
    }

    let report = match monitor.finish().await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error ending session: {e}");
            return;
        }
    };

    println!();
    println!("Session Summary");
    println!("===============");
    println!("  Duration: {}", format_duration(report.stats.total_duration));
    println!("  Focus score: {}%", report.stats.focus_score);
    println!("  Transitions: {}", report.events.len());
    for state in FocusState::ALL {
        println!(
            "  {:<11} {}",
            state.as_str(),
            format_duration(report.stats.time_in(state))
        );
    }

    println!();
    println!("{}", transparency.summary());
}
