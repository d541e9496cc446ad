#![no_main]

use libfuzzer_sys::fuzz_target;

// Arbitrary bytes → JSON → compile(). No input may panic.
fuzz_target!(|data: &[u8]| {
    if let Ok(schema) = serde_json::from_slice::<serde_json::Value>(data) {
        let options = jsonschema_ts_core::CompileOptions {
            ref_options: jsonschema_ts_core::RefOptions {
                external: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let _ = jsonschema_ts_core::compile(&schema, "Fuzz", &options);
    }
});
