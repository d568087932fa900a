#![no_main]

use firewall_sim_client::decoder::{decode, DecodedEvent};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    // Never panics, and classification depends on the input alone.
    let event = decode(raw);
    assert_eq!(event, decode(raw));

    // A decoded step keeps its index and nodes through re-encoding.
    if let DecodedEvent::Step(step) = event {
        if let Ok(json) = serde_json::to_string(&step) {
            match decode(&json) {
                DecodedEvent::Step(again) => {
                    assert_eq!(again.step, step.step);
                    assert_eq!(again.infected_nodes, step.infected_nodes);
                }
                other => panic!("re-encoded step decoded as {other:?}"),
            }
        }
    }
});
