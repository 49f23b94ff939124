#![no_main]

use libfuzzer_sys::fuzz_target;
use std::time::Duration;
use tones::engine::SimulatedEngine;
use tones::lookup::LookupResponse;
use tones::model::Track;
use tones::storage::Persistence;
use tones::store::{Advance, PlayerStore};

fuzz_target!(|data: &[u8]| {
    let mut store = PlayerStore::new(SimulatedEngine::new(), Persistence::in_memory());
    let mut pending = Vec::new();

    for (idx, byte) in data.iter().enumerate() {
        let track = Track {
            duration_seconds: Some(u32::from(byte % 4)),
            ..Track::new(format!("track_{}", byte % 16), format!("Track {idx}"))
        };
        match byte % 10 {
            0 => {
                let _ = store.play(track);
            }
            1 => store.pause(),
            2 => {
                let _ = store.resume();
            }
            3 => {
                let _ = store.enqueue(track);
            }
            4 => {
                if let Ok(Advance::AwaitingRelated(request)) = store.play_next() {
                    pending.push(request);
                }
            }
            5 => {
                if let Some(Advance::AwaitingRelated(request)) =
                    store.report_progress(f64::from(*byte) - 60.0)
                {
                    pending.push(request);
                }
            }
            6 => store.set_auto_play(byte % 2 == 0),
            7 => {
                let _ = store.toggle_like(&track);
            }
            8 => {
                if let Some(request) = pending.pop() {
                    store.complete_related(LookupResponse {
                        request,
                        result: Ok(vec![track]),
                    });
                }
            }
            _ => {
                store.engine_mut().advance(Duration::from_secs(u64::from(*byte)));
                store.pump_engine();
            }
        }

        let progress = store.progress();
        assert!((0.0..=100.0).contains(&progress));
    }
});
