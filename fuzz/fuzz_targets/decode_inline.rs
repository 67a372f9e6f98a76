#![no_main]

use blocksync_doc::{decode_inline, encode_inline, plain_text};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);
    let spans = decode_inline(&input);
    let encoded = encode_inline(&spans);
    let _ = plain_text(&decode_inline(&encoded));
});
