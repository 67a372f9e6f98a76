//! Round-trip tests for the block codec.
//!
//! Markup produced by the encoder must decode to the same blocks, and
//! encoding twice must be stable.

use blocksync_doc::{Block, decode_blocks, encode_blocks};

/// Asserts that decode -> encode is idempotent after the first pass.
fn assert_stable(input: &str) {
    let output1 = encode_blocks(&decode_blocks(input));
    let output2 = encode_blocks(&decode_blocks(&output1));
    assert_eq!(
        output1, output2,
        "Round-trip not idempotent for input:\n{:?}\nFirst output:\n{:?}\nSecond output:\n{:?}",
        input, output1, output2
    );
}

/// Asserts that canonical markup survives unchanged.
fn assert_exact(input: &str) {
    assert_eq!(encode_blocks(&decode_blocks(input)), input);
}

// =============================================================================
// Basic Block Types
// =============================================================================

mod paragraphs {
    use super::*;

    #[test]
    fn single_paragraph() {
        assert_exact("Hello, world!\n");
    }

    #[test]
    fn multiple_paragraphs() {
        assert_exact("First paragraph.\n\nSecond paragraph.\n");
    }

    #[test]
    fn adjacent_lines_become_separate_paragraphs() {
        let blocks = decode_blocks("Line one\nLine two");
        assert_eq!(blocks.len(), 2);
        assert_eq!(encode_blocks(&blocks), "Line one\n\nLine two\n");
    }

    #[test]
    fn empty_document() {
        assert_exact("");
        assert_stable("\n\n\n");
    }
}

mod headings {
    use super::*;

    #[test]
    fn three_levels() {
        assert_exact("# One\n\n## Two\n\n### Three\n");
    }

    #[test]
    fn deeper_levels_are_paragraphs() {
        let blocks = decode_blocks("#### Four");
        assert!(matches!(blocks[0], Block::Paragraph { .. }));
        assert_stable("#### Four");
    }

    #[test]
    fn inline_styles_in_heading() {
        assert_exact("## A **bold** and *soft* [link](https://example.com)\n");
    }
}

mod lists {
    use super::*;

    #[test]
    fn bullets_stay_adjacent() {
        assert_exact("- one\n- two\n- three\n");
    }

    #[test]
    fn numbered_items_renumber() {
        assert_eq!(
            encode_blocks(&decode_blocks("3. a\n3. b\n\npara\n\n9. c")),
            "1. a\n2. b\n\npara\n\n1. c\n"
        );
    }

    #[test]
    fn mixed_list_kinds_share_lines() {
        assert_exact("- bullet\n1. first\n- [ ] open\n- [x] closed\n");
    }

    #[test]
    fn uppercase_check_normalizes() {
        assert_eq!(encode_blocks(&decode_blocks("- [X] done")), "- [x] done\n");
    }
}

mod code_and_quotes {
    use super::*;

    #[test]
    fn fenced_code_keeps_markup_verbatim() {
        assert_exact("```rust\nlet x = **not bold**;\n\n# not a heading\n```\n");
    }

    #[test]
    fn bare_fence() {
        assert_exact("```\nplain\n```\n");
    }

    #[test]
    fn quote_and_divider() {
        assert_exact("> quoted *text*\n\n---\n\nafter\n");
    }

    #[test]
    fn empty_quote() {
        assert_stable(">");
    }
}

mod tables {
    use super::*;

    #[test]
    fn header_table() {
        assert_exact("| a | b |\n| --- | --- |\n| 1 | 2 |\n");
    }

    #[test]
    fn headerless_table() {
        assert_exact("| a | b |\n| 1 | 2 |\n");
    }

    #[test]
    fn ragged_rows_normalize() {
        assert_eq!(
            encode_blocks(&decode_blocks("|a|b|c|\n|-|-|-|\n|1|\n|1|2|3|4|")),
            "| a | b | c |\n| --- | --- | --- |\n| 1 |  |  |\n| 1 | 2 | 3 |\n"
        );
    }
}

mod child_pages {
    use super::*;

    #[test]
    fn inline_marker_survives() {
        assert_exact("Intro\n\n<!-- child_page: abc123 Notes -->\n\nOutro\n");
    }

    #[test]
    fn marker_without_title() {
        assert_exact("<!-- child_page: abc123 -->\n\nOutro\n");
    }

    #[test]
    fn trailing_marker_dropped_after_marking() {
        let mut blocks = decode_blocks("Intro\n\n<!-- child_page: abc123 Notes -->");
        blocks_mark(&mut blocks);
        assert_eq!(encode_blocks(&blocks), "Intro\n");
    }

    fn blocks_mark(blocks: &mut [Block]) {
        blocksync_doc::mark_trailing_child_pages(blocks);
    }
}

mod stability {
    use super::*;

    #[test]
    fn messy_input_settles() {
        assert_stable("  # not heading\n*a **b* c**\n`x\n|\n| --- |\n```");
    }

    #[test]
    fn unmatched_brackets() {
        assert_stable("[open [nested](x) ] (y) [@who](ref:)");
    }
}
