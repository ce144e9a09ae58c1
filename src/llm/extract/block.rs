//! Fenced markdown block extraction

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag};
use std::ops::Range;

/// A code block found by the markdown parser
struct CodeBlock {
    /// First word of the info string; `None` for indented or unlabeled blocks
    label: Option<String>,
    fenced: bool,
    body: String,
    /// Byte range of the whole block in the source text
    span: Range<usize>,
}

fn code_blocks(text: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<CodeBlock> = None;

    for (event, range) in Parser::new(text).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let (fenced, label) = match &kind {
                    CodeBlockKind::Fenced(info) => {
                        (true, info.split_whitespace().next().map(str::to_string))
                    }
                    CodeBlockKind::Indented => (false, None),
                };
                current = Some(CodeBlock {
                    label,
                    fenced,
                    body: String::new(),
                    span: range,
                });
            }
            Event::Text(chunk) => {
                if let Some(block) = current.as_mut() {
                    block.body.push_str(&chunk);
                }
            }
            Event::End(Tag::CodeBlock(_)) => {
                if let Some(mut block) = current.take() {
                    block.body = normalize_newlines(&block.body);
                    blocks.push(block);
                }
            }
            _ => {}
        }
    }
    blocks
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
}

/// Return the inner text of the first fenced block labeled `label`
///
/// The label is the first word of the fence's info string and must match
/// exactly. Blocks with other labels are skipped whole, so a fence nested in
/// their content is never mistaken for a match. A matching block left
/// unterminated runs to the end of the text.
///
/// Models sometimes open a fence mid-line ("Here you go: ```python"), which
/// markdown reads as inline code. When no real block matches, such openers
/// are accepted too, as long as they sit outside every parsed code block.
pub fn extract_block(text: &str, label: &str) -> Option<String> {
    let blocks = code_blocks(text);
    if let Some(block) = blocks
        .iter()
        .find(|block| block.fenced && block.label.as_deref() == Some(label))
    {
        return Some(block.body.clone());
    }

    let spans: Vec<Range<usize>> = blocks.into_iter().map(|block| block.span).collect();
    inline_fenced(text, label, &spans)
}

/// Inner text of every fenced block, in order of appearance
pub(crate) fn fenced_blocks(text: &str) -> Vec<String> {
    code_blocks(text)
        .into_iter()
        .filter(|block| block.fenced)
        .map(|block| block.body)
        .collect()
}

/// Find a labeled fence opener that does not start a line
fn inline_fenced(text: &str, label: &str, skip: &[Range<usize>]) -> Option<String> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let marker = bytes[i];
        if marker != b'`' && marker != b'~' {
            i += 1;
            continue;
        }
        let start = i;
        let run = bytes[start..].iter().take_while(|b| **b == marker).count();
        i += run;
        if run < 3 || skip.iter().any(|span| span.contains(&start)) {
            continue;
        }

        let Some(eol) = text[i..].find('\n') else {
            continue;
        };
        let info = text[i..i + eol].trim();
        if marker == b'`' && info.contains('`') {
            continue;
        }
        if info.split_whitespace().next() != Some(label) {
            continue;
        }

        let body_start = i + eol + 1;
        let fence = &text[start..start + run];
        let body = match text[body_start..].find(fence) {
            Some(end) => &text[body_start..body_start + end],
            None => &text[body_start..],
        };
        return Some(normalize_newlines(body));
    }
    None
}
