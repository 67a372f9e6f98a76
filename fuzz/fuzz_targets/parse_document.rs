#![no_main]

use blocksync_doc::{parse_document, render_document};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);
    if let Ok(document) = parse_document(&input) {
        let _ = parse_document(&render_document(&document));
    }
});
