#![no_main]

use libfuzzer_sys::fuzz_target;

use hazdoc_io::{fill_bytes, DocumentFormat};
use hazdoc_model::FieldMap;

/// Keep inputs small; the package loader has its own inflate limits.
const MAX_INPUT_BYTES: usize = 256 * 1024;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() || data.len() > MAX_INPUT_BYTES {
        return;
    }
    let format = if data[0] & 1 == 0 {
        DocumentFormat::Docx
    } else {
        DocumentFormat::Xlsx
    };
    let fields: FieldMap = [
        ("SHIPPER", "ACME & Sons <Ltd>"),
        ("SHIPPER_ADDRESS", "1 Quay St\nSingapore"),
        ("UNNO", "1789"),
    ]
    .into_iter()
    .collect();

    // Arbitrary bytes must fail cleanly, never panic.
    let _ = fill_bytes(format, "fuzz", &data[1..], &fields);
});
