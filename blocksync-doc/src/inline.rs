//! Inline markup codec.
//!
//! Converts between a line of inline markup and a list of [`TextSpan`]s.
//! Supported markers are `**bold**`, `*italic*`, `` `code` ``,
//! `~~strikethrough~~`, `[text](url)` links and `[@title](ref:id)` page
//! mentions. Decoding never fails: an opening marker without a matching close
//! is kept as literal text.

/// Character-level formatting carried by a span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Annotations {
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    pub strikethrough: bool,
}

impl Annotations {
    pub const PLAIN: Self = Self {
        bold: false,
        italic: false,
        code: false,
        strikethrough: false,
    };

    pub fn bold() -> Self {
        Self {
            bold: true,
            ..Self::PLAIN
        }
    }

    pub fn italic() -> Self {
        Self {
            italic: true,
            ..Self::PLAIN
        }
    }

    pub fn code() -> Self {
        Self {
            code: true,
            ..Self::PLAIN
        }
    }

    pub fn strikethrough() -> Self {
        Self {
            strikethrough: true,
            ..Self::PLAIN
        }
    }

    pub fn is_plain(&self) -> bool {
        *self == Self::PLAIN
    }
}

/// A run of text sharing one set of annotations.
///
/// A span is either a text run (optionally linked) or a page mention, never
/// both: `link` and `mention` are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub content: String,
    pub annotations: Annotations,
    pub link: Option<String>,
    /// Id of the mentioned page. `content` holds its title.
    pub mention: Option<String>,
}

impl TextSpan {
    pub fn plain(content: impl Into<String>) -> Self {
        Self::styled(content, Annotations::PLAIN)
    }

    pub fn styled(content: impl Into<String>, annotations: Annotations) -> Self {
        Self {
            content: content.into(),
            annotations,
            link: None,
            mention: None,
        }
    }

    pub fn link(content: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            link: Some(url.into()),
            ..Self::plain(content)
        }
    }

    pub fn mention(title: impl Into<String>, page_id: impl Into<String>) -> Self {
        Self {
            mention: Some(page_id.into()),
            ..Self::plain(title)
        }
    }

    fn mergeable_with(&self, other: &TextSpan) -> bool {
        self.mention.is_none()
            && other.mention.is_none()
            && self.annotations == other.annotations
            && self.link == other.link
    }
}

/// Concatenates the visible text of `spans`.
pub fn plain_text(spans: &[TextSpan]) -> String {
    spans.iter().map(|span| span.content.as_str()).collect()
}

/// Renders spans as inline markup.
///
/// Strikethrough, bold and italic wrap maximal runs of adjacent spans that
/// share them, in that order from the outside in, so `**a*b***` rather than
/// `**a*****b***`. Code wraps each span's own text, inside its link label when
/// it has one. A mention is written bare; code does not apply to it.
pub fn encode_inline(spans: &[TextSpan]) -> String {
    let merged = merge_adjacent(spans.iter().cloned());
    let mut output = String::new();
    encode_layer(&merged, 0, &mut output);
    output
}

/// Shared wrappers, outermost first.
const WRAPPERS: [&str; 3] = ["~~", "**", "*"];

fn has_wrapper(annotations: Annotations, layer: usize) -> bool {
    match layer {
        0 => annotations.strikethrough,
        1 => annotations.bold,
        _ => annotations.italic,
    }
}

fn encode_layer(spans: &[TextSpan], layer: usize, out: &mut String) {
    let Some(wrapper) = WRAPPERS.get(layer) else {
        for span in spans {
            encode_span(span, out);
        }
        return;
    };
    let runs = spans.chunk_by(|a, b| {
        has_wrapper(a.annotations, layer) == has_wrapper(b.annotations, layer)
    });
    for run in runs {
        let wrapped = run
            .first()
            .is_some_and(|span| has_wrapper(span.annotations, layer));
        if wrapped {
            out.push_str(wrapper);
        }
        encode_layer(run, layer + 1, out);
        if wrapped {
            out.push_str(wrapper);
        }
    }
}

fn encode_span(span: &TextSpan, out: &mut String) {
    if let Some(page_id) = &span.mention {
        out.push_str(&format!("[@{}](ref:{page_id})", span.content));
        return;
    }
    let text = if span.annotations.code {
        format!("`{}`", span.content)
    } else {
        span.content.clone()
    };
    match &span.link {
        Some(url) => out.push_str(&format!("[{text}]({url})")),
        None => out.push_str(&text),
    }
}

/// Parses inline markup into spans with a single left-to-right scan.
///
/// Every input byte ends up either in a span's content or in a recognised
/// marker; adjacent spans with identical formatting are merged. A mention
/// keeps its span even when its title is empty.
pub fn decode_inline(text: &str) -> Vec<TextSpan> {
    let mut spans = Vec::new();
    decode_into(text, &Style::default(), &mut spans);
    merge_adjacent(spans)
}

#[derive(Debug, Clone, Default)]
struct Style {
    annotations: Annotations,
    link: Option<String>,
}

impl Style {
    fn with(&self, update: impl FnOnce(&mut Annotations)) -> Style {
        let mut next = self.clone();
        update(&mut next.annotations);
        next
    }

    fn span(&self, content: &str) -> TextSpan {
        TextSpan {
            content: content.to_string(),
            annotations: self.annotations,
            link: self.link.clone(),
            mention: None,
        }
    }
}

fn is_marker_byte(byte: u8) -> bool {
    matches!(byte, b'*' | b'`' | b'[' | b'~')
}

fn decode_into(text: &str, style: &Style, out: &mut Vec<TextSpan>) {
    let bytes = text.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        if let Some(next) = decode_marker(text, index, style, out) {
            index = next;
            continue;
        }

        let start = index;
        if is_marker_byte(bytes[index]) {
            // Unmatched marker, kept as a literal. Markers are ASCII so this
            // stays on a char boundary.
            index += 1;
        } else {
            while index < bytes.len() && !is_marker_byte(bytes[index]) {
                index += 1;
            }
        }
        out.push(style.span(&text[start..index]));
    }
}

/// Tries every marker at `index`; returns the index just past the consumed
/// markup when one matched.
fn decode_marker(text: &str, index: usize, style: &Style, out: &mut Vec<TextSpan>) -> Option<usize> {
    let rest = &text[index..];

    if rest.starts_with("**") {
        let inner = index + 2;
        if let Some(end) = find_double_close(text, inner, b'*')
            && end > inner
        {
            decode_into(&text[inner..end], &style.with(|a| a.bold = true), out);
            return Some(end + 2);
        }
        return None;
    }

    if rest.starts_with("~~") {
        let inner = index + 2;
        if let Some(end) = find_double_close(text, inner, b'~')
            && end > inner
        {
            let struck = style.with(|a| a.strikethrough = true);
            decode_into(&text[inner..end], &struck, out);
            return Some(end + 2);
        }
        return None;
    }

    if rest.starts_with('*') {
        let inner = index + 1;
        if let Some(end) = find_single(text, inner, b'*')
            && end > inner
        {
            decode_into(&text[inner..end], &style.with(|a| a.italic = true), out);
            return Some(end + 1);
        }
        return None;
    }

    if rest.starts_with('`') {
        let inner = index + 1;
        if let Some(end) = find_single(text, inner, b'`')
            && end > inner
        {
            out.push(style.with(|a| a.code = true).span(&text[inner..end]));
            return Some(end + 1);
        }
        return None;
    }

    if rest.starts_with('[') && style.link.is_none() {
        return decode_bracket(text, index, style, out);
    }

    None
}

fn decode_bracket(text: &str, index: usize, style: &Style, out: &mut Vec<TextSpan>) -> Option<usize> {
    let bytes = text.as_bytes();
    let close_bracket = find_single(text, index + 1, b']')?;
    if bytes.get(close_bracket + 1) != Some(&b'(') {
        return None;
    }
    let close_paren = find_single(text, close_bracket + 2, b')')?;
    let label = &text[index + 1..close_bracket];
    let target = &text[close_bracket + 2..close_paren];
    if label.is_empty() {
        return None;
    }

    if let (Some(title), Some(page_id)) = (label.strip_prefix('@'), target.strip_prefix("ref:"))
        && !page_id.is_empty()
    {
        out.push(TextSpan {
            content: title.to_string(),
            annotations: style.annotations,
            link: None,
            mention: Some(page_id.to_string()),
        });
        return Some(close_paren + 1);
    }

    let linked = Style {
        annotations: style.annotations,
        link: Some(target.to_string()),
    };
    decode_into(label, &linked, out);
    Some(close_paren + 1)
}

/// Finds a closing `marker marker` pair at or after `from`. A pair that is
/// immediately followed by a third marker byte is skipped so that `***x***`
/// closes on the last two bytes.
fn find_double_close(text: &str, from: usize, marker: u8) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut index = from;
    while index + 1 < bytes.len() {
        if bytes[index] == marker
            && bytes[index + 1] == marker
            && bytes.get(index + 2) != Some(&marker)
        {
            return Some(index);
        }
        index += 1;
    }
    None
}

fn find_single(text: &str, from: usize, marker: u8) -> Option<usize> {
    text.as_bytes()
        .get(from..)?
        .iter()
        .position(|byte| *byte == marker)
        .map(|offset| from + offset)
}

fn merge_adjacent(spans: impl IntoIterator<Item = TextSpan>) -> Vec<TextSpan> {
    let mut merged: Vec<TextSpan> = Vec::new();
    for span in spans {
        if span.content.is_empty() && span.mention.is_none() {
            continue;
        }
        match merged.last_mut() {
            Some(last) if last.mergeable_with(&span) => last.content.push_str(&span.content),
            _ => merged.push(span),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_single_span() {
        let spans = decode_inline("Hello, world");
        assert_eq!(spans, vec![TextSpan::plain("Hello, world")]);
    }

    #[test]
    fn test_bold_italic_code() {
        let spans = decode_inline("a **b** *c* `d`");
        assert_eq!(
            spans,
            vec![
                TextSpan::plain("a "),
                TextSpan::styled("b", Annotations::bold()),
                TextSpan::plain(" "),
                TextSpan::styled("c", Annotations::italic()),
                TextSpan::plain(" "),
                TextSpan::styled("d", Annotations::code()),
            ]
        );
    }

    #[test]
    fn test_link_and_mention() {
        let spans = decode_inline("see [docs](https://example.com) and [@Roadmap](ref:abc123)");
        assert_eq!(spans[1], TextSpan::link("docs", "https://example.com"));
        assert_eq!(spans[3], TextSpan::mention("Roadmap", "abc123"));
    }

    #[test]
    fn test_mention_with_empty_title_is_kept() {
        let spans = decode_inline("[@](ref:abc123)");
        assert_eq!(spans, vec![TextSpan::mention("", "abc123")]);
        assert_eq!(encode_inline(&spans), "[@](ref:abc123)");

        let spans = decode_inline("a [@](ref:x1) b");
        assert_eq!(spans.len(), 3);
        assert_eq!(encode_inline(&spans), "a [@](ref:x1) b");
    }

    #[test]
    fn test_at_label_without_ref_scheme_is_a_link() {
        let spans = decode_inline("[@someone](https://example.com/u)");
        assert_eq!(spans, vec![TextSpan::link("@someone", "https://example.com/u")]);
    }

    #[test]
    fn test_unclosed_markers_are_literal() {
        for input in ["**open", "*open", "`open", "[open", "[x](open", "~~open", "a * b", "****"] {
            let spans = decode_inline(input);
            assert_eq!(plain_text(&spans), input, "input {input:?}");
            assert!(spans.iter().all(|span| span.annotations.is_plain()));
        }
    }

    #[test]
    fn test_nested_bold_italic() {
        let spans = decode_inline("***both***");
        assert_eq!(
            spans,
            vec![TextSpan::styled(
                "both",
                Annotations {
                    bold: true,
                    italic: true,
                    ..Annotations::PLAIN
                }
            )]
        );
    }

    #[test]
    fn test_encode_precedence_round_trips() {
        let all = Annotations {
            bold: true,
            italic: true,
            code: true,
            strikethrough: true,
        };
        let spans = vec![
            TextSpan::plain("x "),
            TextSpan::styled("y", all),
            TextSpan {
                link: Some("https://e.com".into()),
                ..TextSpan::styled("z", Annotations::bold())
            },
        ];
        let encoded = encode_inline(&spans);
        assert_eq!(encoded, "x ~~***`y`***~~**[z](https://e.com)**");
        assert_eq!(decode_inline(&encoded), spans);
    }

    #[test]
    fn test_adjacent_equal_spans_merge_before_encoding() {
        let spans = vec![
            TextSpan::styled("a", Annotations::bold()),
            TextSpan::styled("b", Annotations::bold()),
        ];
        assert_eq!(encode_inline(&spans), "**ab**");
    }

    #[test]
    fn test_shared_styles_wrap_adjacent_runs_once() {
        let both = Annotations {
            bold: true,
            italic: true,
            ..Annotations::PLAIN
        };
        let spans = vec![
            TextSpan::styled("a", Annotations::bold()),
            TextSpan::styled("b", both),
        ];
        let encoded = encode_inline(&spans);
        assert_eq!(encoded, "**a*b***");
        assert_eq!(decode_inline(&encoded), spans);

        let spans = vec![
            TextSpan::styled("a", Annotations::italic()),
            TextSpan::styled("b", both),
            TextSpan::styled("c", Annotations::bold()),
        ];
        let encoded = encode_inline(&spans);
        assert_eq!(encoded, "*a****b*c**");
        assert_eq!(decode_inline(&encoded), spans);
    }

    #[test]
    fn test_bold_mention() {
        let spans = vec![TextSpan {
            annotations: Annotations::bold(),
            ..TextSpan::mention("Plan", "p1")
        }];
        let encoded = encode_inline(&spans);
        assert_eq!(encoded, "**[@Plan](ref:p1)**");
        assert_eq!(decode_inline(&encoded), spans);
    }

    #[test]
    fn test_multibyte_text_survives() {
        let input = "héllo *wörld* 🇺🇸 `ç`";
        let spans = decode_inline(input);
        assert_eq!(plain_text(&spans), "héllo wörld 🇺🇸 ç");
        assert_eq!(encode_inline(&spans), input);
    }

    #[test]
    fn test_empty_input() {
        assert!(decode_inline("").is_empty());
        assert_eq!(encode_inline(&[]), "");
    }
}
