//! Conversion between remote records and typed blocks.
//!
//! Remote payloads are schema-free maps. They are decoded into [`Block`]s
//! here, at the boundary, and nowhere else.

use crate::transport::RemoteRecord;
use blocksync_doc::{
    Annotations, Block, HeadingLevel, Table, TextSpan, mark_trailing_child_pages, plain_text,
    renumber,
};
use serde_json::{Map, Value, json};
use unicode_segmentation::UnicodeSegmentation;

/// Longest content the remote accepts in one rich-text item, in characters.
pub const MAX_RICH_TEXT_CHARS: usize = 2000;

const REMOTE_PLAIN_TEXT: &str = "plain text";

const LANGUAGE_ALIASES: &[(&str, &str)] = &[
    ("plaintext", REMOTE_PLAIN_TEXT),
    ("plain", REMOTE_PLAIN_TEXT),
    ("text", REMOTE_PLAIN_TEXT),
    ("txt", REMOTE_PLAIN_TEXT),
    ("js", "javascript"),
    ("ts", "typescript"),
    ("py", "python"),
    ("rb", "ruby"),
    ("rs", "rust"),
    ("sh", "shell"),
    ("bash", "shell"),
    ("zsh", "shell"),
    ("yml", "yaml"),
    ("dockerfile", "docker"),
    ("md", "markdown"),
];

const REMOTE_LANGUAGES: &[&str] = &[
    "abap", "arduino", "assembly", "bash", "c", "c#", "c++", "clojure", "coffeescript", "css",
    "dart", "diff", "docker", "elixir", "elm", "erlang", "flow", "fortran", "f#", "gherkin",
    "glsl", "go", "graphql", "groovy", "haskell", "html", "java", "javascript", "json", "julia",
    "kotlin", "latex", "less", "lisp", "livescript", "lua", "makefile", "markdown", "markup",
    "matlab", "mermaid", "nix", "objective-c", "ocaml", "pascal", "perl", "php", "plain text",
    "powershell", "prolog", "protobuf", "python", "r", "reason", "ruby", "rust", "sass", "scala",
    "scheme", "scss", "shell", "sql", "swift", "typescript", "vb.net", "verilog", "vhdl",
    "visual basic", "webassembly", "xml", "yaml", "java/c/c++/c#",
];

/// Maps a fence language to the remote vocabulary. Unknown languages become
/// plain text.
pub fn to_remote_language(language: &str) -> &'static str {
    let language = language.trim().to_lowercase();
    if let Some((_, mapped)) = LANGUAGE_ALIASES.iter().find(|(alias, _)| *alias == language) {
        return *mapped;
    }
    REMOTE_LANGUAGES
        .iter()
        .find(|known| **known == language)
        .copied()
        .unwrap_or(REMOTE_PLAIN_TEXT)
}

/// Maps a remote language back to a fence language; plain text is a bare
/// fence.
pub fn from_remote_language(language: &str) -> String {
    if language == REMOTE_PLAIN_TEXT {
        String::new()
    } else {
        language.to_string()
    }
}

/// Decodes a remote rich-text array.
pub fn spans_from_rich_text(items: &[Value]) -> Vec<TextSpan> {
    items.iter().filter_map(span_from_item).collect()
}

fn span_from_item(item: &Value) -> Option<TextSpan> {
    let content = item
        .get("plain_text")
        .and_then(Value::as_str)
        .or_else(|| item.pointer("/text/content").and_then(Value::as_str))?;
    let annotations = item
        .get("annotations")
        .map(|flags| {
            let flag = |name: &str| flags.get(name).and_then(Value::as_bool).unwrap_or(false);
            Annotations {
                bold: flag("bold"),
                italic: flag("italic"),
                code: flag("code"),
                strikethrough: flag("strikethrough"),
            }
        })
        .unwrap_or_default();

    if item.get("type").and_then(Value::as_str) == Some("mention") {
        // Only page mentions survive as mentions; users, dates and the rest
        // keep their rendered text.
        if let Some(page_id) = item.pointer("/mention/page/id").and_then(Value::as_str) {
            let mut span = TextSpan::mention(content, page_id);
            span.annotations = annotations;
            return Some(span);
        }
        return Some(TextSpan::styled(content, annotations));
    }

    let mut span = TextSpan::styled(content, annotations);
    span.link = item
        .pointer("/text/link/url")
        .and_then(Value::as_str)
        .or_else(|| item.get("href").and_then(Value::as_str))
        .map(str::to_string);
    Some(span)
}

/// Encodes spans as a remote rich-text array, splitting long content.
pub fn rich_text_from_spans(spans: &[TextSpan]) -> Vec<Value> {
    let mut items = Vec::new();
    for span in spans {
        let annotations = annotations_json(span.annotations);
        if let Some(page_id) = &span.mention {
            let mut item = json!({
                "type": "mention",
                "mention": {"type": "page", "page": {"id": page_id}},
                "plain_text": span.content,
            });
            if let (Some(object), Some(annotations)) = (item.as_object_mut(), annotations.clone()) {
                object.insert("annotations".into(), annotations);
            }
            items.push(item);
            continue;
        }
        for chunk in split_content(&span.content) {
            let link = span
                .link
                .as_ref()
                .map_or(Value::Null, |url| json!({ "url": url }));
            let mut item = json!({
                "type": "text",
                "text": {"content": chunk, "link": link},
            });
            if let (Some(object), Some(annotations)) = (item.as_object_mut(), annotations.clone()) {
                object.insert("annotations".into(), annotations);
            }
            items.push(item);
        }
    }
    items
}

fn annotations_json(annotations: Annotations) -> Option<Value> {
    (!annotations.is_plain()).then(|| {
        json!({
            "bold": annotations.bold,
            "italic": annotations.italic,
            "strikethrough": annotations.strikethrough,
            "code": annotations.code,
        })
    })
}

/// Splits `content` into pieces of at most [`MAX_RICH_TEXT_CHARS`]
/// characters without breaking a grapheme cluster.
pub fn split_content(content: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut chars = 0;
    for (offset, grapheme) in content.grapheme_indices(true) {
        let width = grapheme.chars().count();
        if chars > 0 && chars + width > MAX_RICH_TEXT_CHARS {
            chunks.push(&content[start..offset]);
            start = offset;
            chars = 0;
        }
        chars += width;
    }
    if start < content.len() {
        chunks.push(&content[start..]);
    }
    chunks
}

fn rich_text_of(payload: &Map<String, Value>) -> Vec<TextSpan> {
    payload
        .get("rich_text")
        .and_then(Value::as_array)
        .map(|items| spans_from_rich_text(items))
        .unwrap_or_default()
}

/// Maps one remote record to a block. Returns `None` for types with no
/// markup form.
pub fn block_from_record(record: &RemoteRecord) -> Option<Block> {
    let payload = &record.payload;
    let spans = || rich_text_of(payload);
    let block = match record.kind.as_str() {
        "heading_1" | "heading_2" | "heading_3" => {
            let depth = record.kind.as_bytes()[record.kind.len() - 1] - b'0';
            Block::Heading {
                level: HeadingLevel::from_depth(depth)?,
                spans: spans(),
            }
        }
        "paragraph" => Block::Paragraph { spans: spans() },
        "bulleted_list_item" => Block::BulletItem { spans: spans() },
        "numbered_list_item" => Block::NumberedItem {
            spans: spans(),
            ordinal: 0,
        },
        "to_do" => Block::Checkbox {
            spans: spans(),
            checked: payload
                .get("checked")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        },
        "quote" | "callout" => Block::Quote { spans: spans() },
        "code" => Block::CodeBlock {
            text: plain_text(&spans()),
            language: from_remote_language(
                payload
                    .get("language")
                    .and_then(Value::as_str)
                    .unwrap_or(REMOTE_PLAIN_TEXT),
            ),
        },
        "divider" => Block::Divider,
        "table" => Block::Table(table_from_record(record)?),
        "child_page" => Block::child_page(
            record.id.clone(),
            record.child_page_title().unwrap_or_default(),
        ),
        _ if payload.contains_key("rich_text") => Block::Paragraph { spans: spans() },
        _ => return None,
    };
    Some(block)
}

fn table_from_record(record: &RemoteRecord) -> Option<Table> {
    let rows = record
        .children
        .iter()
        .filter(|row| row.kind == "table_row")
        .map(|row| {
            row.payload
                .get("cells")
                .and_then(Value::as_array)
                .map(|cells| {
                    cells
                        .iter()
                        .map(|cell| {
                            cell.as_array()
                                .map(|items| spans_from_rich_text(items))
                                .unwrap_or_default()
                        })
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        })
        .collect();
    let has_header_row = record
        .payload
        .get("has_column_header")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    Table::new(rows, has_header_row)
}

/// Maps a fetched tree to blocks.
///
/// Children of ordinary blocks follow their parent, so nesting depth is
/// flattened. Table rows belong to their table and child pages are never
/// expanded. Ordinals are renumbered and trailing child pages marked.
pub fn blocks_from_records(records: &[RemoteRecord]) -> Vec<Block> {
    let mut blocks = Vec::with_capacity(records.len());
    flatten_into(records, &mut blocks);
    renumber(&mut blocks);
    mark_trailing_child_pages(&mut blocks);
    blocks
}

fn flatten_into(records: &[RemoteRecord], blocks: &mut Vec<Block>) {
    for record in records {
        if let Some(block) = block_from_record(record) {
            blocks.push(block);
        }
        if record.kind != "table" && !record.is_child_page() {
            flatten_into(&record.children, blocks);
        }
    }
}

/// Remote payload for a block. Child pages cannot be created by appending,
/// so they have none.
pub fn record_payload(block: &Block) -> Option<Value> {
    let (kind, body) = match block {
        Block::Heading { level, spans } => {
            let kind = match level {
                HeadingLevel::H1 => "heading_1",
                HeadingLevel::H2 => "heading_2",
                HeadingLevel::H3 => "heading_3",
            };
            (kind, json!({ "rich_text": rich_text_from_spans(spans) }))
        }
        Block::Paragraph { spans } => (
            "paragraph",
            json!({ "rich_text": rich_text_from_spans(spans) }),
        ),
        Block::BulletItem { spans } => (
            "bulleted_list_item",
            json!({ "rich_text": rich_text_from_spans(spans) }),
        ),
        Block::NumberedItem { spans, .. } => (
            "numbered_list_item",
            json!({ "rich_text": rich_text_from_spans(spans) }),
        ),
        Block::Checkbox { spans, checked } => (
            "to_do",
            json!({ "rich_text": rich_text_from_spans(spans), "checked": checked }),
        ),
        Block::Quote { spans } => (
            "quote",
            json!({ "rich_text": rich_text_from_spans(spans) }),
        ),
        Block::CodeBlock { text, language } => (
            "code",
            json!({
                "rich_text": rich_text_from_spans(&[TextSpan::plain(text.as_str())]),
                "language": to_remote_language(language),
            }),
        ),
        Block::Divider => ("divider", json!({})),
        Block::Table(table) => {
            let rows: Vec<Value> = table
                .rows
                .iter()
                .map(|row| {
                    let cells: Vec<Value> = row
                        .iter()
                        .map(|cell| Value::Array(rich_text_from_spans(cell)))
                        .collect();
                    json!({
                        "object": "block",
                        "type": "table_row",
                        "table_row": { "cells": cells },
                    })
                })
                .collect();
            (
                "table",
                json!({
                    "table_width": table.width(),
                    "has_column_header": table.has_header_row,
                    "has_row_header": false,
                    "children": rows,
                }),
            )
        }
        Block::ChildPage { .. } => return None,
    };
    Some(json!({ "object": "block", "type": kind, kind: body }))
}

/// Block types whose content is a single rich-text array.
const TEXT_KINDS: &[&str] = &[
    "paragraph",
    "heading_1",
    "heading_2",
    "heading_3",
    "bulleted_list_item",
    "numbered_list_item",
    "to_do",
    "quote",
    "callout",
    "toggle",
    "code",
];

/// Payload that blanks a block of type `kind` in place, keeping its type.
/// `None` for types without text content (tables, dividers, media).
pub fn blank_payload(kind: &str) -> Option<Value> {
    TEXT_KINDS
        .contains(&kind)
        .then(|| json!({ "object": "block", "type": kind, kind: { "rich_text": [] } }))
}
