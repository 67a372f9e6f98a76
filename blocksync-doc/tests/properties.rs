use blocksync_doc::{
    Annotations, Block, TextSpan, decode_blocks, decode_inline, encode_blocks, encode_inline,
    line_diff, plain_text,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Bytes the inline decoder may consume as markup.
const INLINE_MARKERS: &[char] = &['*', '`', '~', '[', ']', '(', ')', '@', ':'];

fn word() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9]{1,8}"
}

fn styled_span() -> impl Strategy<Value = TextSpan> {
    (word(), any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
        |(content, bold, italic, code, strikethrough)| {
            TextSpan::styled(
                content,
                Annotations {
                    bold,
                    italic,
                    code,
                    strikethrough,
                },
            )
        },
    )
}

/// Styled spans separated by plain spaces. Markup for two differently styled
/// spans that touch is ambiguous, so generated input keeps them apart.
fn spaced_spans() -> impl Strategy<Value = Vec<TextSpan>> {
    vec(styled_span(), 0..6).prop_map(|spans| {
        let mut spaced = Vec::new();
        for span in spans {
            if !spaced.is_empty() {
                spaced.push(TextSpan::plain(" "));
            }
            spaced.push(span);
        }
        spaced
    })
}

/// Arbitrary text mixed with text dense in inline markers.
fn inline_input() -> impl Strategy<Value = String> {
    prop_oneof!["\\PC{0,200}", "[*`~\\[\\]()@a-z: ]{0,40}"]
}

fn without(text: &str, markers: &[char]) -> String {
    text.chars().filter(|c| !markers.contains(c)).collect()
}

/// Characters that reach the decoded spans as content, link target or
/// mention id.
fn carried_chars(spans: &[TextSpan]) -> BTreeSet<char> {
    let mut chars = BTreeSet::new();
    for span in spans {
        chars.extend(span.content.chars());
        chars.extend(span.link.iter().flat_map(|link| link.chars()));
        if let Some(id) = &span.mention {
            chars.extend(id.chars());
            chars.extend("ref".chars());
        }
    }
    chars
}

fn line_text() -> impl Strategy<Value = String> {
    vec(word(), 1..5).prop_map(|words| words.join(" "))
}

fn block() -> impl Strategy<Value = String> {
    prop_oneof![
        line_text(),
        line_text().prop_map(|text| format!("# {text}")),
        line_text().prop_map(|text| format!("- {text}")),
        line_text().prop_map(|text| format!("1. {text}")),
        line_text().prop_map(|text| format!("- [x] {text}")),
        line_text().prop_map(|text| format!("> {text}")),
        Just("---".to_string()),
        line_text().prop_map(|text| format!("```\n{text}\n```")),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(proptest_config::cases()))]
    #[test]
    fn test_inline_plain_text_preserved(spans in spaced_spans()) {
        let encoded = encode_inline(&spans);
        prop_assert_eq!(plain_text(&decode_inline(&encoded)), plain_text(&spans));
    }

    #[test]
    fn test_inline_encode_is_fixed_point(spans in spaced_spans()) {
        let once = encode_inline(&spans);
        let twice = encode_inline(&decode_inline(&once));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn test_block_encode_is_fixed_point(blocks in vec(block(), 0..8)) {
        let input = blocks.join("\n\n");
        let once = encode_blocks(&decode_blocks(&input));
        let twice = encode_blocks(&decode_blocks(&once));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn test_inline_decode_keeps_text_outside_markers(input in inline_input()) {
        let spans = decode_inline(&input);
        let carried = carried_chars(&spans);
        for c in without(&input, INLINE_MARKERS).chars() {
            prop_assert!(carried.contains(&c), "{c:?} of {input:?} lost in {spans:?}");
        }
    }

    #[test]
    fn test_inline_decode_without_links_drops_only_style_markers(input in inline_input()) {
        let input = input.replace('(', "");
        let visible = plain_text(&decode_inline(&input));
        prop_assert_eq!(without(&visible, &['*', '`', '~']), without(&input, &['*', '`', '~']));
    }

    #[test]
    fn test_decode_never_panics(input in "\\PC{0,200}") {
        let blocks: Vec<Block> = decode_blocks(&input);
        let _ = encode_blocks(&blocks);
    }

    #[test]
    fn test_diff_of_equal_sides_is_empty(lines in vec(line_text(), 0..10)) {
        let text = lines.join("\n");
        prop_assert!(line_diff(&text, &text).is_empty());
    }
}
