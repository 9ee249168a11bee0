#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use runtime::{NoHooks, Observer, RuntimeConfig};
use schema::{EntityTypeDef, LerpPolicy, PropertyDef, Schema, ValueType};

fn schema() -> Option<Arc<Schema>> {
    Schema::builder()
        .entity(
            EntityTypeDef::new(1, "ship")
                .property(PropertyDef::new(0, "pose", ValueType::Pose).lerp(LerpPolicy::Smooth))
                .property(PropertyDef::new(1, "hull", ValueType::I32).notify())
                .property(PropertyDef::new(2, "name", ValueType::String))
                .property(PropertyDef::new(3, "throttle", ValueType::F32).predicted(0.05)),
        )
        .entity(EntityTypeDef::new(2, "tags").property(PropertyDef::new(0, "ids", ValueType::IntArray)))
        .build()
        .ok()
        .map(Arc::new)
}

fuzz_target!(|data: &[u8]| {
    let Some(schema) = schema() else {
        return;
    };
    let Ok(mut observer) = Observer::new(schema, RuntimeConfig::for_testing()) else {
        return;
    };

    // Length-prefixed frames: even lengths are tick state, odd ones release notices.
    let mut idx = 0usize;
    while idx < data.len() && idx < 4096 {
        let len = usize::from(data[idx]) % 200;
        idx += 1;
        let end = (idx + len).min(data.len());
        let frame = &data[idx..end];
        idx = end;

        if len % 2 == 0 {
            let _ = observer.receive(frame, &mut NoHooks);
        } else {
            let _ = observer.receive_release(frame, &mut NoHooks);
        }
        let _ = wire::decode_ack(frame);
        let _ = wire::peek_tick(frame);
    }
});
