//! Block codec: line-oriented markup to and from typed blocks.
//!
//! Decoding is a greedy, line-local classifier rather than a grammar. Each
//! non-empty line is offered to [`LINE_RULES`] in priority order; the first
//! rule that accepts it produces a block, and anything left over becomes a
//! paragraph. Adding a block variant means adding one rule.

use crate::inline::{TextSpan, decode_inline, encode_inline, plain_text};

/// Prefix of the comment-like line that marks a child page's position.
pub const CHILD_PAGE_MARKER: &str = "<!-- child_page:";
const CHILD_PAGE_MARKER_END: &str = "-->";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HeadingLevel {
    H1,
    H2,
    H3,
}

impl HeadingLevel {
    pub fn from_depth(depth: u8) -> Option<Self> {
        match depth {
            1 => Some(Self::H1),
            2 => Some(Self::H2),
            3 => Some(Self::H3),
            _ => None,
        }
    }

    pub fn depth(self) -> u8 {
        match self {
            Self::H1 => 1,
            Self::H2 => 2,
            Self::H3 => 3,
        }
    }

    fn marker(self) -> &'static str {
        match self {
            Self::H1 => "# ",
            Self::H2 => "## ",
            Self::H3 => "### ",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading {
        level: HeadingLevel,
        spans: Vec<TextSpan>,
    },
    Paragraph {
        spans: Vec<TextSpan>,
    },
    BulletItem {
        spans: Vec<TextSpan>,
    },
    /// `ordinal` restarts at 1 whenever the previous block is not also a
    /// numbered item.
    NumberedItem {
        spans: Vec<TextSpan>,
        ordinal: u32,
    },
    Checkbox {
        spans: Vec<TextSpan>,
        checked: bool,
    },
    Quote {
        spans: Vec<TextSpan>,
    },
    CodeBlock {
        text: String,
        language: String,
    },
    Divider,
    Table(Table),
    /// Position of a nested child page. Trailing child pages sit after the
    /// last content block and are not written to markup.
    ChildPage {
        id: String,
        title: String,
        trailing: bool,
    },
}

impl Block {
    pub fn paragraph(markup: &str) -> Self {
        Block::Paragraph {
            spans: decode_inline(markup),
        }
    }

    pub fn child_page(id: impl Into<String>, title: impl Into<String>) -> Self {
        Block::ChildPage {
            id: id.into(),
            title: title.into(),
            trailing: false,
        }
    }

    pub fn spans(&self) -> Option<&[TextSpan]> {
        match self {
            Block::Heading { spans, .. }
            | Block::Paragraph { spans }
            | Block::BulletItem { spans }
            | Block::NumberedItem { spans, .. }
            | Block::Checkbox { spans, .. }
            | Block::Quote { spans } => Some(spans.as_slice()),
            _ => None,
        }
    }

    /// Visible text of the block, without markup.
    pub fn plain_text(&self) -> String {
        match self {
            Block::CodeBlock { text, .. } => text.clone(),
            Block::Table(table) => table
                .rows
                .iter()
                .map(|row| row.iter().map(|cell| plain_text(cell)).collect::<Vec<_>>().join(" "))
                .collect::<Vec<_>>()
                .join("\n"),
            Block::ChildPage { title, .. } => title.clone(),
            Block::Divider => String::new(),
            other => other.spans().map(plain_text).unwrap_or_default(),
        }
    }

    pub fn is_list_item(&self) -> bool {
        matches!(
            self,
            Block::BulletItem { .. } | Block::NumberedItem { .. } | Block::Checkbox { .. }
        )
    }

    pub fn child_page_id(&self) -> Option<&str> {
        match self {
            Block::ChildPage { id, .. } => Some(id),
            _ => None,
        }
    }

    fn is_omitted(&self) -> bool {
        match self {
            Block::ChildPage { trailing, .. } => *trailing,
            Block::Paragraph { spans } => spans
                .iter()
                .all(|span| span.content.is_empty() && span.mention.is_none()),
            _ => false,
        }
    }
}

/// A table block. Every row has the same number of cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Vec<Vec<TextSpan>>>,
    pub has_header_row: bool,
}

impl Table {
    /// Builds a table whose width is fixed by the first row: shorter rows are
    /// right-padded with empty cells and longer rows truncated. Returns `None`
    /// when there are no rows.
    pub fn new(mut rows: Vec<Vec<Vec<TextSpan>>>, has_header_row: bool) -> Option<Self> {
        let width = rows.first()?.len();
        for row in &mut rows {
            row.resize(width, Vec::new());
        }
        Some(Self {
            rows,
            has_header_row,
        })
    }

    pub fn width(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }
}

/// Reassigns numbered-item ordinals from their position in the sequence.
pub fn renumber(blocks: &mut [Block]) {
    let mut previous = 0;
    for block in blocks.iter_mut() {
        if let Block::NumberedItem { ordinal, .. } = block {
            previous += 1;
            *ordinal = previous;
        } else if !block.is_omitted() {
            previous = 0;
        }
    }
}

/// Marks every child page that follows the last content block as trailing.
pub fn mark_trailing_child_pages(blocks: &mut [Block]) {
    let last_content = blocks
        .iter()
        .rposition(|block| !matches!(block, Block::ChildPage { .. }));
    for (index, block) in blocks.iter_mut().enumerate() {
        if let Block::ChildPage { trailing, .. } = block {
            *trailing = last_content.is_none_or(|last| index > last);
        }
    }
}

struct Cursor<'a> {
    lines: Vec<&'a str>,
    index: usize,
}

impl<'a> Cursor<'a> {
    fn line(&self) -> &'a str {
        self.lines[self.index]
    }

    fn peek_next(&self) -> Option<&'a str> {
        self.lines.get(self.index + 1).copied()
    }
}

/// A line rule inspects the current line and, when it applies, returns a
/// block. Rules that consume more than one line leave the cursor on the last
/// line they used.
type LineRule = fn(&mut Cursor<'_>) -> Option<Block>;

const LINE_RULES: &[LineRule] = &[
    heading_rule,
    divider_rule,
    code_fence_rule,
    checkbox_rule,
    bullet_rule,
    numbered_rule,
    quote_rule,
    table_rule,
    child_page_rule,
];

/// Splits markup into typed blocks. Never fails.
pub fn decode_blocks(text: &str) -> Vec<Block> {
    let mut cursor = Cursor {
        lines: text.lines().collect(),
        index: 0,
    };
    let mut blocks = Vec::new();

    while cursor.index < cursor.lines.len() {
        if cursor.line().trim().is_empty() {
            cursor.index += 1;
            continue;
        }
        let block = LINE_RULES
            .iter()
            .find_map(|rule| rule(&mut cursor))
            .unwrap_or_else(|| Block::paragraph(cursor.line()));
        blocks.push(block);
        cursor.index += 1;
    }

    renumber(&mut blocks);
    blocks
}

fn heading_rule(cursor: &mut Cursor<'_>) -> Option<Block> {
    let line = cursor.line();
    [HeadingLevel::H1, HeadingLevel::H2, HeadingLevel::H3]
        .into_iter()
        .find_map(|level| {
            line.strip_prefix(level.marker()).map(|rest| Block::Heading {
                level,
                spans: decode_inline(rest),
            })
        })
}

fn divider_rule(cursor: &mut Cursor<'_>) -> Option<Block> {
    (cursor.line() == "---").then_some(Block::Divider)
}

fn code_fence_rule(cursor: &mut Cursor<'_>) -> Option<Block> {
    let language = cursor.line().strip_prefix("```")?.trim().to_string();
    let mut contents = Vec::new();
    // An unterminated fence runs to the end of input.
    while let Some(next) = cursor.peek_next() {
        cursor.index += 1;
        if next.starts_with("```") {
            break;
        }
        contents.push(next);
    }
    Some(Block::CodeBlock {
        text: contents.join("\n"),
        language,
    })
}

fn checkbox_rule(cursor: &mut Cursor<'_>) -> Option<Block> {
    let line = cursor.line();
    let (checked, rest) = if let Some(rest) = line.strip_prefix("- [ ]") {
        (false, rest)
    } else if let Some(rest) = line
        .strip_prefix("- [x]")
        .or_else(|| line.strip_prefix("- [X]"))
    {
        (true, rest)
    } else {
        return None;
    };
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some(Block::Checkbox {
        spans: decode_inline(rest.strip_prefix(' ').unwrap_or(rest)),
        checked,
    })
}

fn bullet_rule(cursor: &mut Cursor<'_>) -> Option<Block> {
    let rest = cursor.line().strip_prefix("- ")?;
    Some(Block::BulletItem {
        spans: decode_inline(rest),
    })
}

fn numbered_rule(cursor: &mut Cursor<'_>) -> Option<Block> {
    let line = cursor.line();
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let rest = line[digits..].strip_prefix(". ")?;
    Some(Block::NumberedItem {
        spans: decode_inline(rest),
        ordinal: 0,
    })
}

fn quote_rule(cursor: &mut Cursor<'_>) -> Option<Block> {
    let line = cursor.line();
    let rest = line.strip_prefix("> ").or((line == ">").then_some(""))?;
    Some(Block::Quote {
        spans: decode_inline(rest),
    })
}

fn table_rule(cursor: &mut Cursor<'_>) -> Option<Block> {
    if !cursor.line().starts_with('|') {
        return None;
    }
    let mut lines = vec![cursor.line()];
    let mut end = cursor.index;
    while let Some(next) = cursor
        .lines
        .get(end + 1)
        .copied()
        .filter(|line| line.starts_with('|'))
    {
        lines.push(next);
        end += 1;
    }

    let has_header_row = lines.get(1).is_some_and(|line| is_separator_row(line));
    let rows: Vec<Vec<Vec<TextSpan>>> = lines
        .iter()
        .filter(|line| !is_separator_row(line))
        .map(|line| {
            split_cells(line)
                .into_iter()
                .map(decode_inline)
                .collect::<Vec<_>>()
        })
        .collect();
    // A group made only of separator rows is not a table; leave the lines to
    // the paragraph fallback.
    let table = Table::new(rows, has_header_row)?;
    cursor.index = end;
    Some(Block::Table(table))
}

fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.contains('-')
        && trimmed
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

fn split_cells(line: &str) -> Vec<&str> {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('|').unwrap_or(trimmed);
    trimmed.split('|').map(str::trim).collect()
}

fn child_page_rule(cursor: &mut Cursor<'_>) -> Option<Block> {
    let inner = cursor
        .line()
        .trim()
        .strip_prefix(CHILD_PAGE_MARKER)?
        .strip_suffix(CHILD_PAGE_MARKER_END)?
        .trim();
    let (id, title) = inner.split_once(' ').unwrap_or((inner, ""));
    if id.is_empty() {
        return None;
    }
    Some(Block::child_page(id, title.trim()))
}

/// Renders blocks as markup.
///
/// Blocks are separated by one blank line, except consecutive list items
/// which sit on adjacent lines. Numbered ordinals are recomputed from
/// position. Trailing child pages and empty paragraphs are omitted.
pub fn encode_blocks(blocks: &[Block]) -> String {
    let mut output = String::new();
    let mut previous: Option<&Block> = None;
    let mut ordinal = 0;

    for block in blocks.iter().filter(|block| !block.is_omitted()) {
        ordinal = match (block, previous) {
            (Block::NumberedItem { .. }, Some(Block::NumberedItem { .. })) => ordinal + 1,
            (Block::NumberedItem { .. }, _) => 1,
            _ => 0,
        };
        if let Some(previous) = previous {
            if previous.is_list_item() && block.is_list_item() {
                output.push('\n');
            } else {
                output.push_str("\n\n");
            }
        }
        encode_block(block, ordinal, &mut output);
        previous = Some(block);
    }

    if !output.is_empty() {
        output.push('\n');
    }
    output
}

fn encode_block(block: &Block, ordinal: u32, output: &mut String) {
    match block {
        Block::Heading { level, spans } => {
            output.push_str(level.marker());
            output.push_str(&encode_inline(spans));
        }
        Block::Paragraph { spans } => output.push_str(&encode_inline(spans)),
        Block::BulletItem { spans } => {
            output.push_str("- ");
            output.push_str(&encode_inline(spans));
        }
        Block::NumberedItem { spans, .. } => {
            output.push_str(&format!("{ordinal}. {}", encode_inline(spans)));
        }
        Block::Checkbox { spans, checked } => {
            output.push_str(if *checked { "- [x] " } else { "- [ ] " });
            output.push_str(&encode_inline(spans));
        }
        Block::Quote { spans } => {
            output.push_str("> ");
            output.push_str(&encode_inline(spans));
        }
        Block::CodeBlock { text, language } => {
            output.push_str("```");
            output.push_str(language);
            output.push('\n');
            output.push_str(text);
            output.push_str("\n```");
        }
        Block::Divider => output.push_str("---"),
        Block::Table(table) => output.push_str(&encode_table(table)),
        Block::ChildPage { id, title, .. } => {
            if title.is_empty() {
                output.push_str(&format!("{CHILD_PAGE_MARKER} {id} {CHILD_PAGE_MARKER_END}"));
            } else {
                output.push_str(&format!(
                    "{CHILD_PAGE_MARKER} {id} {title} {CHILD_PAGE_MARKER_END}"
                ));
            }
        }
    }
}

fn encode_table(table: &Table) -> String {
    let mut lines = Vec::with_capacity(table.rows.len() + 1);
    for (index, row) in table.rows.iter().enumerate() {
        let cells: Vec<String> = row.iter().map(|cell| encode_inline(cell)).collect();
        lines.push(format!("| {} |", cells.join(" | ")));
        if index == 0 && table.has_header_row {
            let separator = vec!["---"; table.width().max(1)];
            lines.push(format!("| {} |", separator.join(" | ")));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inline::Annotations;

    fn ordinals(blocks: &[Block]) -> Vec<Option<u32>> {
        blocks
            .iter()
            .map(|block| match block {
                Block::NumberedItem { ordinal, .. } => Some(*ordinal),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_classifies_each_line_kind() {
        let input = "# One\n## Two\n### Three\n#### Four\n---\n- [ ] todo\n- [x] done\n- bullet\n12. numbered\n> quote\n<!-- child_page: abc Notes -->\nplain";
        let blocks = decode_blocks(input);
        let kinds: Vec<&str> = blocks
            .iter()
            .map(|block| match block {
                Block::Heading { .. } => "heading",
                Block::Paragraph { .. } => "paragraph",
                Block::BulletItem { .. } => "bullet",
                Block::NumberedItem { .. } => "numbered",
                Block::Checkbox { .. } => "checkbox",
                Block::Quote { .. } => "quote",
                Block::CodeBlock { .. } => "code",
                Block::Divider => "divider",
                Block::Table(_) => "table",
                Block::ChildPage { .. } => "child_page",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "heading", "heading", "heading", "paragraph", "divider", "checkbox", "checkbox",
                "bullet", "numbered", "quote", "child_page", "paragraph"
            ]
        );
        assert_eq!(blocks[6], Block::Checkbox {
            spans: vec![TextSpan::plain("done")],
            checked: true,
        });
        assert_eq!(blocks[10], Block::child_page("abc", "Notes"));
    }

    #[test]
    fn test_numbered_ordinal_reset() {
        let blocks = decode_blocks("1. a\n2. b\n- c\n1. d");
        assert_eq!(ordinals(&blocks), vec![Some(1), Some(2), None, Some(1)]);
    }

    #[test]
    fn test_ordinals_come_from_position_not_markup() {
        let blocks = decode_blocks("7. a\n7. b\n7. c");
        assert_eq!(ordinals(&blocks), vec![Some(1), Some(2), Some(3)]);
        assert_eq!(encode_blocks(&blocks), "1. a\n2. b\n3. c\n");
    }

    #[test]
    fn test_table_decode() {
        let blocks = decode_blocks("| Name | Status |\n| --- | --- |\n| Task 1 | Done |");
        assert_eq!(blocks.len(), 1);
        let Block::Table(table) = &blocks[0] else {
            panic!("Expected table block");
        };
        assert!(table.has_header_row);
        let text: Vec<Vec<String>> = table
            .rows
            .iter()
            .map(|row| row.iter().map(|cell| plain_text(cell)).collect())
            .collect();
        assert_eq!(
            text,
            vec![vec!["Name", "Status"], vec!["Task 1", "Done"]]
        );
    }

    #[test]
    fn test_short_table_rows_are_padded() {
        let blocks = decode_blocks("| a | b | c |\n| d |");
        let Block::Table(table) = &blocks[0] else {
            panic!("Expected table block");
        };
        assert!(!table.has_header_row);
        assert_eq!(table.rows[1].len(), 3);
        assert!(table.rows[1][2].is_empty());
    }

    #[test]
    fn test_separator_only_group_is_paragraph() {
        let blocks = decode_blocks("| --- |");
        assert_eq!(blocks, vec![Block::paragraph("| --- |")]);
    }

    #[test]
    fn test_code_fence_keeps_blank_lines_and_markup() {
        let blocks = decode_blocks("```rust\nfn main() {\n\n    # not a heading\n}\n```\nafter");
        assert_eq!(
            blocks[0],
            Block::CodeBlock {
                text: "fn main() {\n\n    # not a heading\n}".into(),
                language: "rust".into(),
            }
        );
        assert_eq!(blocks[1], Block::paragraph("after"));
    }

    #[test]
    fn test_unterminated_fence_runs_to_end() {
        let blocks = decode_blocks("```\nline 1\n- line 2");
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            blocks[0],
            Block::CodeBlock {
                text: "line 1\n- line 2".into(),
                language: String::new(),
            }
        );
    }

    #[test]
    fn test_encode_spacing() {
        let blocks = decode_blocks("# Title\n\nIntro **bold**\n\n- a\n- b\n1. c\n\n> quote\n\n---");
        assert_eq!(
            encode_blocks(&blocks),
            "# Title\n\nIntro **bold**\n\n- a\n- b\n1. c\n\n> quote\n\n---\n"
        );
    }

    #[test]
    fn test_trailing_child_pages_are_omitted() {
        let mut blocks = vec![
            Block::child_page("lead", "Lead"),
            Block::paragraph("content"),
            Block::child_page("tail", "Tail"),
        ];
        mark_trailing_child_pages(&mut blocks);
        assert_eq!(
            encode_blocks(&blocks),
            "<!-- child_page: lead Lead -->\n\ncontent\n"
        );
    }

    #[test]
    fn test_only_child_pages_are_all_trailing() {
        let mut blocks = vec![Block::child_page("a", "A"), Block::child_page("b", "")];
        mark_trailing_child_pages(&mut blocks);
        assert!(blocks.iter().all(|block| matches!(
            block,
            Block::ChildPage { trailing: true, .. }
        )));
        assert_eq!(encode_blocks(&blocks), "");
    }

    #[test]
    fn test_table_encode_with_annotations() {
        let table = Table::new(
            vec![
                vec![vec![TextSpan::plain("H")], vec![TextSpan::plain("I")]],
                vec![vec![TextSpan::styled("x", Annotations::bold())]],
            ],
            true,
        )
        .unwrap();
        assert_eq!(
            encode_blocks(&[Block::Table(table)]),
            "| H | I |\n| --- | --- |\n| **x** |  |\n"
        );
    }

    #[test]
    fn test_empty_items_decode() {
        let blocks = decode_blocks("- [ ]\n- \n>");
        assert_eq!(
            blocks,
            vec![
                Block::Checkbox {
                    spans: vec![],
                    checked: false
                },
                Block::BulletItem { spans: vec![] },
                Block::Quote { spans: vec![] },
            ]
        );
    }
}
