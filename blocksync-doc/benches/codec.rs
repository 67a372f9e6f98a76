use blocksync_doc::{decode_blocks, encode_blocks, parse_document};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn sample_markup(sections: usize) -> String {
    let mut markup = String::new();
    for index in 0..sections {
        markup.push_str(&format!(
            "## Section {index}\n\nSome **bold** and *italic* text with a [link](https://example.com/{index}).\n\n- first\n- second\n1. one\n2. two\n\n| a | b |\n| --- | --- |\n| {index} | x |\n\n```rust\nfn main() {{}}\n```\n\n<!-- child_page: page{index} Child {index} -->\n\n"
        ));
    }
    markup
}

fn bench_decode(c: &mut Criterion) {
    let markup = sample_markup(200);
    c.bench_function("decode_blocks", |b| {
        b.iter(|| black_box(decode_blocks(black_box(&markup))))
    });
}

fn bench_encode(c: &mut Criterion) {
    let blocks = decode_blocks(&sample_markup(200));
    c.bench_function("encode_blocks", |b| {
        b.iter(|| black_box(encode_blocks(black_box(&blocks))))
    });
}

fn bench_parse_document(c: &mut Criterion) {
    let text = format!(
        "---\nremote_id: abc123\ntitle: Bench\n---\n\n{}\n---\n\n## Comments\n\n> **Ada** *(Jan 5, 2026)*: ok\n",
        sample_markup(50)
    );
    c.bench_function("parse_document", |b| {
        b.iter(|| black_box(parse_document(black_box(&text))))
    });
}

criterion_group!(benches, bench_decode, bench_encode, bench_parse_document);
criterion_main!(benches);
