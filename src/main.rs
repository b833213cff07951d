//! Headless effect runner.
//!
//! ```text
//! effectgraph <effect.json> [frames] [seed]
//! ```
//!
//! Loads an effect document, steps it at 60 Hz until it finishes or the
//! frame budget runs out, and logs progress. Set `RUST_LOG=debug` for layer
//! transitions and timeline events.

use effectgraph::{EffectSpec, FrameClock, ParticleVertex};
use std::env;
use std::process;

const DEFAULT_FRAMES: u64 = 600;
const STEP: f32 = 1.0 / 60.0;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: {} <effect.json> [frames] [seed]", args[0]);
        process::exit(2);
    }

    let frames = match args.get(2).map(|s| s.parse::<u64>()) {
        None => DEFAULT_FRAMES,
        Some(Ok(n)) => n,
        Some(Err(e)) => {
            eprintln!("invalid frame count '{}': {e}", args[2]);
            process::exit(2);
        }
    };
    let seed = match args.get(3).map(|s| s.parse::<u64>()) {
        None => None,
        Some(Ok(n)) => Some(n),
        Some(Err(e)) => {
            eprintln!("invalid seed '{}': {e}", args[3]);
            process::exit(2);
        }
    };

    if let Err(e) = run(&args[1], frames, seed) {
        log::error!("{e}");
        process::exit(1);
    }
}

fn run(path: &str, frames: u64, seed: Option<u64>) -> effectgraph::Result<()> {
    let mut spec = EffectSpec::load(path)?;
    for adjustment in spec.clamp() {
        log::info!(
            "{} limited: {} -> {}",
            adjustment.field,
            adjustment.requested,
            adjustment.applied
        );
    }

    let mut effect = spec.build_with_seed(seed.unwrap_or(spec.seed))?;
    let mut clock = FrameClock::fixed(STEP);
    let mut vertices: Vec<ParticleVertex> = Vec::new();
    let mut peak = 0;

    while clock.frame() < frames && effect.is_active() {
        effect.update(clock.tick());

        vertices.clear();
        effect.write_vertices(&mut vertices);
        peak = peak.max(vertices.len());

        for message in effect.drain_notifications() {
            log::info!("[{:.2}s] {message}", clock.elapsed());
        }
        if clock.frame() % 60 == 0 {
            let lit = effect.lights().iter().filter(|l| l.is_lit()).count();
            log::info!(
                "[{:.2}s] particles={} children={} lights={} position={:?}",
                clock.elapsed(),
                vertices.len(),
                effect.children().len(),
                lit,
                effect.position()
            );
        }
    }

    log::info!(
        "'{}' ran {} frames ({:.2}s), peak {} particles ({} bytes of vertex data)",
        effect.name(),
        clock.frame(),
        clock.elapsed(),
        peak,
        peak * std::mem::size_of::<ParticleVertex>()
    );
    effect.dispose();
    Ok(())
}
