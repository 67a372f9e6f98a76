#![no_main]

use blocksync_doc::{decode_blocks, encode_blocks};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);
    let once = encode_blocks(&decode_blocks(&input));
    let twice = encode_blocks(&decode_blocks(&once));
    assert_eq!(once, twice);
});
