//! Rough timings for month resolution.
//!
//! Run with: cargo bench

use std::hint::black_box;
use std::time::Instant;

#[cfg(test)]
mod benches {
    use super::*;
    use greenvale::{
        engine::{EngineBuilder, EngineSettings},
        planner::{Autoplay, Planner},
    };

    /// A settlement grown for five simulated years, then timed for one more.
    #[test]
    fn benchmark_month_tick() {
        let engine = EngineBuilder::new(EngineSettings {
            challenges_block_clock: false,
            ..EngineSettings::default()
        })
        .build()
        .unwrap();
        let autoplay = Autoplay {
            placements_per_month: 4,
            ..Autoplay::default()
        };
        Planner::new(5, Vec::new(), Some(autoplay))
            .play(&engine, 60)
            .unwrap();

        let start = Instant::now();
        for _ in 0..12 {
            black_box(engine.advance_month().unwrap());
        }
        let per_month = start.elapsed() / 12;
        println!(
            "{} buildings, {} history points: {:?} per month",
            engine.state().buildings().len(),
            engine.state().history().len(),
            per_month
        );
    }
}
