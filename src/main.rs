//! taxel-strip: runs the touch pipeline against a simulated 28-taxel ring.
//!
//! Control messages are read from stdin, one JSON object per line, e.g.
//! `{"numBits": 10, "noiseThreshold": 0.05}`. Telemetry frames are logged as
//! they arrive. Set `TAXEL_LOG` (`trace` .. `error`) to change the log level.
//!
//! ```text
//! taxel-strip [--seconds N] [--fingers N]
//! ```

use std::io::{self, BufRead};
use std::thread;
use std::time::{Duration, Instant};

use itertools::Itertools;
use serde_json::Value;
use tracing::{error, info, warn, Level};

use taxel::{Finger, Pipeline, SetupParams, SimulatedBus, StopFlag, TelemetryFrame, telemetry_ring};

fn main() {
    let level = std::env::var("TAXEL_LOG")
        .ok()
        .and_then(|l| l.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).with_thread_names(true).init();

    let seconds = arg_value("--seconds").unwrap_or(10.0_f32).max(0.1);
    let fingers = arg_value("--fingers").unwrap_or(2_usize).min(8);

    if let Err(e) = run(Duration::from_secs_f32(seconds), fingers) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(duration: Duration, fingers: usize) -> Result<(), Box<dyn std::error::Error>> {
    let params = SetupParams::default();

    #[cfg(feature = "cpal_clock")]
    let audio = taxel::CpalClock::default_output();
    #[cfg(feature = "cpal_clock")]
    let params = match &audio {
        Some(clock) => params.with_sample_rate(clock.sample_rate()),
        None => params,
    };

    let bus = (0..fingers).fold(SimulatedBus::ring(params.taxel_count), |bus, i| {
        let location = (i * params.taxel_count / fingers.max(1)) as f32 + 2.0;
        bus.with_finger(Finger::new(location, 0.6, 0.9).with_velocity(0.05 * (i as f32 + 1.0)))
    });
    let (sink, mut telemetry) = telemetry_ring(params.telemetry_capacity);

    let pipeline = Pipeline::build(&params, bus, sink)?;
    let mut control = pipeline.control;
    let stop = StopFlag::new();

    let acquisition = pipeline.acquisition.spawn(params.acquisition_interval, stop.clone())?;

    #[cfg(feature = "cpal_clock")]
    let (_running, software) = match audio {
        Some(clock) => {
            info!(device = clock.name(), "using audio device as frame clock");
            (Some(clock.start(pipeline.emitter)?), None)
        }
        None => {
            warn!("no audio output device, falling back to software clock");
            (None, Some(software_clock(&params, pipeline.emitter, &stop)?))
        }
    };
    #[cfg(not(feature = "cpal_clock"))]
    let software = Some(software_clock(&params, pipeline.emitter, &stop)?);

    // stdin blocks, so this thread is detached rather than joined
    thread::Builder::new().name("control".into()).spawn(move || {
        for line in io::stdin().lock().lines().map_while(Result::ok) {
            if control.is_abandoned() {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(&line) {
                Ok(Value::Object(fields)) => {
                    let submitted = control.submit(&fields);
                    info!(queued = submitted.queued, dropped = submitted.dropped, "control message");
                }
                Ok(other) => warn!(%other, "control message is not an object, ignoring"),
                Err(err) => warn!(%err, "malformed control message"),
            }
        }
    })?;

    let start = Instant::now();
    let mut frames = 0u64;
    while start.elapsed() < duration {
        while let Some(frame) = telemetry.next_frame() {
            frames += 1;
            if frames % 20 == 1 {
                log_frame(&frame);
            }
        }
        thread::sleep(Duration::from_millis(5));
    }

    stop.request_stop();
    let task = acquisition.join().map_err(|_| "acquisition thread panicked")?;
    if let Some(handle) = software {
        let emitter = handle.join().map_err(|_| "frame clock thread panicked")?;
        info!(emissions = emitter.emissions(), skipped = emitter.sink().skipped(), "frame clock stopped");
    }
    info!(
        cycles = task.cycle(),
        frames,
        applied = task.dispatch_stats().applied,
        rejected = task.dispatch_stats().rejected,
        "done"
    );
    Ok(())
}

fn software_clock(
    params: &SetupParams,
    emitter: taxel::TelemetryEmitter<taxel::RtrbTelemetrySink>,
    stop: &StopFlag,
) -> io::Result<thread::JoinHandle<taxel::TelemetryEmitter<taxel::RtrbTelemetrySink>>> {
    taxel::SoftwareClock::new(params.sample_rate, 64).spawn(emitter, stop.clone())
}

fn log_frame(frame: &TelemetryFrame) {
    let active = frame.active.unwrap_or(0);
    let touches = frame
        .locations
        .iter()
        .zip(frame.sizes.iter())
        .flat_map(|(l, s)| l.iter().zip(s.iter()).take(active))
        .map(|(l, s)| format!("{l:.2}@{s:.3}"))
        .join(", ");
    info!(channels = frame.channels.unwrap_or(0), active, "touches: [{}]", touches);
}

fn arg_value<T: std::str::FromStr>(flag: &str) -> Option<T> {
    let args: Vec<String> = std::env::args().collect();
    let at = args.iter().position(|a| a == flag)?;
    args.get(at + 1)?.parse().ok()
}
