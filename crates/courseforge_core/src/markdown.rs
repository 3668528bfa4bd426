//! crates/courseforge_core/src/markdown.rs
//!
//! A minimal structured-markdown reader for generated content bodies. The
//! grammar is deliberately small: headings, bullet lists, numbered lists,
//! and bold-paragraph lines. Anything else is a plain paragraph. The lesson
//! endpoints serve these blocks alongside the raw text so viewers do not
//! each re-implement the parse.

use serde::{Deserialize, Serialize};

/// One rendered block of a content body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Heading { level: u8, text: String },
    BulletList { items: Vec<String> },
    NumberedList { items: Vec<String> },
    /// A standalone line fully wrapped in `**`, used by the generator for
    /// emphasized lead-ins.
    BoldParagraph { text: String },
    Paragraph { text: String },
}

/// Parses a content body into display blocks. Consecutive list lines of the
/// same kind are grouped into one list; consecutive plain lines are joined
/// into one paragraph.
pub fn parse_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            flush_paragraph(&mut paragraph, &mut blocks);
            continue;
        }

        if let Some((level, heading)) = parse_heading(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::Heading {
                level,
                text: heading.to_string(),
            });
        } else if let Some(item) = parse_bullet(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            match blocks.last_mut() {
                Some(Block::BulletList { items }) => items.push(item.to_string()),
                _ => blocks.push(Block::BulletList {
                    items: vec![item.to_string()],
                }),
            }
        } else if let Some(item) = parse_numbered(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            match blocks.last_mut() {
                Some(Block::NumberedList { items }) => items.push(item.to_string()),
                _ => blocks.push(Block::NumberedList {
                    items: vec![item.to_string()],
                }),
            }
        } else if let Some(bold) = parse_bold_line(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::BoldParagraph {
                text: bold.to_string(),
            });
        } else {
            paragraph.push(trimmed);
        }
    }
    flush_paragraph(&mut paragraph, &mut blocks);
    blocks
}

fn flush_paragraph(paragraph: &mut Vec<&str>, blocks: &mut Vec<Block>) {
    if !paragraph.is_empty() {
        blocks.push(Block::Paragraph {
            text: paragraph.join(" "),
        });
        paragraph.clear();
    }
}

fn parse_heading(line: &str) -> Option<(u8, &str)> {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if (1..=6).contains(&hashes) {
        let rest = &line[hashes..];
        if let Some(text) = rest.strip_prefix(' ') {
            if !text.trim().is_empty() {
                return Some((hashes as u8, text.trim()));
            }
        }
    }
    None
}

fn parse_bullet(line: &str) -> Option<&str> {
    line.strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse_numbered(line: &str) -> Option<&str> {
    let digits = line.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    line[digits..]
        .strip_prefix(". ")
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse_bold_line(line: &str) -> Option<&str> {
    // Whole-line bold only; inline bold stays part of its paragraph.
    if line.len() > 4 && line.starts_with("**") && line.ends_with("**") {
        let inner = &line[2..line.len() - 2];
        if !inner.contains("**") && !inner.trim().is_empty() {
            return Some(inner.trim());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_bullets_and_paragraphs() {
        let body = "# Overview\n\nAPIs let programs talk.\nThey use contracts.\n\n## Goals\n- Understand REST\n- Design endpoints\n";
        let blocks = parse_blocks(body);
        assert_eq!(
            blocks,
            vec![
                Block::Heading { level: 1, text: "Overview".into() },
                Block::Paragraph { text: "APIs let programs talk. They use contracts.".into() },
                Block::Heading { level: 2, text: "Goals".into() },
                Block::BulletList {
                    items: vec!["Understand REST".into(), "Design endpoints".into()]
                },
            ]
        );
    }

    #[test]
    fn numbered_lists_group_consecutive_lines() {
        let blocks = parse_blocks("1. First\n2. Second\n10. Tenth\n");
        assert_eq!(
            blocks,
            vec![Block::NumberedList {
                items: vec!["First".into(), "Second".into(), "Tenth".into()]
            }]
        );
    }

    #[test]
    fn whole_line_bold_becomes_bold_paragraph() {
        let blocks = parse_blocks("**Key takeaway**\n\nRegular text with **inline bold** stays put.\n");
        assert_eq!(blocks[0], Block::BoldParagraph { text: "Key takeaway".into() });
        assert_eq!(
            blocks[1],
            Block::Paragraph { text: "Regular text with **inline bold** stays put.".into() }
        );
    }

    #[test]
    fn hash_run_without_space_is_a_paragraph() {
        let blocks = parse_blocks("#nospace\n####### seven\n");
        assert_eq!(
            blocks,
            vec![Block::Paragraph { text: "#nospace ####### seven".into() }]
        );
    }
}
