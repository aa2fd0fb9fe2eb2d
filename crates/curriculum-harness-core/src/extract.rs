//! Lexical entity extraction: capability statements and knowledge topics.
//!
//! Capability statements are recovered by anchoring on the dialect's action
//! verbs; knowledge topics by anchoring on dotted-decimal numbering. Neither
//! pass ever fails: an empty result is a valid outcome that the pipeline
//! reports as a data-quality warning.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::dialect::Dialect;
use crate::models::{Capability, CapabilityCategory, KnowledgeSubtopic, KnowledgeTopic};
use crate::text::{char_prefix, collapse_whitespace, fold};

/// Joined text of a column plus the byte offsets where each source line starts.
struct Stream {
    text: String,
    line_starts: Vec<usize>,
}

/// Rejoin wrapped lines into a single whitespace-normalised stream.
///
/// A line ending in `-` followed by a lowercase continuation is treated as a
/// hyphenated word break and glued without a space. Line starts are recorded
/// both before and after any bullet marker.
fn join_wrapped(text: &str, dialect: &Dialect) -> Stream {
    let mut out = String::with_capacity(text.len());
    let mut line_starts = Vec::new();
    for raw in text.lines() {
        let line = collapse_whitespace(raw);
        if line.is_empty() {
            continue;
        }
        let continues_word = out.ends_with('-')
            && line.chars().next().is_some_and(|c| c.is_lowercase());
        if continues_word {
            out.pop();
        } else {
            if !out.is_empty() {
                out.push(' ');
            }
            line_starts.push(out.len());
            let bullet_len = line.len() - dialect.strip_bullet(&line).len();
            if bullet_len > 0 {
                line_starts.push(out.len() + bullet_len);
            }
        }
        out.push_str(&line);
    }
    Stream {
        text: out,
        line_starts,
    }
}

/// End offset (exclusive) of the sentence starting at `start`, if one
/// terminates before `limit`.
fn sentence_end(text: &str, start: usize, limit: usize) -> Option<usize> {
    let window = &text[start..limit];
    let mut chars = window.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | ';' | '!' | '?') {
            let at_boundary = match chars.peek() {
                None => true,
                Some((_, next)) => next.is_whitespace(),
            };
            if at_boundary {
                return Some(start + i + c.len_utf8());
            }
        }
    }
    None
}

fn within(len: usize, min: usize, max: usize) -> bool {
    len >= min && len <= max
}

fn clean_statement(s: &str) -> String {
    let s = collapse_whitespace(s);
    s.trim_end_matches([';', ',']).trim_end().to_string()
}

/// Verb-anchored sentences: each capitalised vocabulary verb opens a
/// candidate that must reach a sentence terminator before the next line that
/// itself opens with a vocabulary verb.
fn anchored_statements(stream: &Stream, dialect: &Dialect) -> Vec<String> {
    let limits = &dialect.limits;
    let starts: Vec<usize> = dialect.verb_starts(&stream.text).collect();
    let line_starts: HashSet<usize> = stream.line_starts.iter().copied().collect();

    let mut out = Vec::new();
    let mut consumed = 0usize;
    for (idx, &start) in starts.iter().enumerate() {
        if start < consumed {
            continue;
        }
        let limit = starts[idx + 1..]
            .iter()
            .copied()
            .find(|s| line_starts.contains(s))
            .unwrap_or(stream.text.len());
        let Some(end) = sentence_end(&stream.text, start, limit) else {
            continue;
        };
        let statement = clean_statement(&stream.text[start..end]);
        if within(
            statement.chars().count(),
            limits.capability_min_chars,
            limits.capability_max_chars,
        ) {
            out.push(statement);
            consumed = end;
        }
    }
    out
}

/// Line heuristic used when no verb-anchored sentence was found.
fn line_statements(text: &str, dialect: &Dialect) -> Vec<String> {
    let limits = &dialect.limits;
    text.lines()
        .map(|l| clean_statement(dialect.strip_bullet(l.trim())))
        .filter(|l| dialect.starts_with_verb(l))
        .filter(|l| {
            within(
                l.chars().count(),
                limits.capability_min_chars,
                limits.capability_max_chars,
            )
        })
        .collect()
}

/// Accumulates capability statements for one module.
///
/// Deduplicates across every block of the module and numbers statements
/// per category (`CB1`, `CB2`, `CT1`, ...).
#[derive(Debug, Default)]
pub struct CapabilityCollector {
    seen: HashSet<String>,
    counters: HashMap<CapabilityCategory, usize>,
    items: Vec<Capability>,
}

impl CapabilityCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract statements from one block of left-column text.
    ///
    /// Returns how many new statements were accepted.
    pub fn collect(&mut self, text: &str, category: CapabilityCategory, dialect: &Dialect) -> usize {
        let stream = join_wrapped(text, dialect);
        let mut statements = anchored_statements(&stream, dialect);
        if statements.is_empty() {
            statements = line_statements(text, dialect);
            if !statements.is_empty() {
                debug!(
                    count = statements.len(),
                    category = %category,
                    "capabilities recovered by line fallback"
                );
            }
        }

        let mut accepted = 0;
        for description in statements {
            let key = char_prefix(&fold(&description), dialect.limits.dedup_prefix_chars).to_string();
            if !self.seen.insert(key) {
                continue;
            }
            let n = self.counters.entry(category).or_insert(0);
            *n += 1;
            self.items.push(Capability {
                code: format!("{}{}", dialect.prefix(category), n),
                category,
                description,
            });
            accepted += 1;
        }
        accepted
    }

    pub fn finish(self) -> Vec<Capability> {
        self.items
    }
}

/// Extract capability statements from a single block of text.
pub fn extract_capabilities(
    text: &str,
    category: CapabilityCategory,
    dialect: &Dialect,
) -> Vec<Capability> {
    let mut collector = CapabilityCollector::new();
    collector.collect(text, category, dialect);
    collector.finish()
}

/// Knowledge hierarchy recovered from right-column text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeExtraction {
    pub topics: Vec<KnowledgeTopic>,
    /// Subtopics dropped because no topic with their leading segment was seen.
    pub orphans: usize,
}

struct RawItem {
    code: String,
    title: String,
}

/// Split right-column text into numbered items, gluing wrapped title lines
/// onto the item they continue.
fn numbered_items(text: &str, dialect: &Dialect) -> Vec<RawItem> {
    let max = dialect.limits.title_max_chars;
    let mut items: Vec<RawItem> = Vec::new();
    let mut open = false;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if dialect.is_knowledge_heading(line) {
            open = false;
            continue;
        }

        // A marker opens an item at line start, or mid-line when the title
        // that follows is capitalised ("1 ALGORITMOS 1.1 Variáveis").
        let markers: Vec<(usize, usize, &str)> = dialect
            .numbered_items(line)
            .filter(|(start, end, _)| {
                *start == 0 || line[*end..].chars().next().is_some_and(|c| c.is_uppercase())
            })
            .collect();

        let head_end = markers.first().map(|m| m.0).unwrap_or(line.len());
        let head = line[..head_end].trim();
        if !head.is_empty() {
            match items.last_mut() {
                Some(last) if open && last.title.chars().count() + 1 + head.chars().count() <= max => {
                    last.title.push(' ');
                    last.title.push_str(head);
                }
                _ => open = false,
            }
        }

        for (i, (_, end, code)) in markers.iter().enumerate() {
            let title_end = markers.get(i + 1).map(|m| m.0).unwrap_or(line.len());
            items.push(RawItem {
                code: code.to_string(),
                title: line[*end..title_end].trim().to_string(),
            });
            open = true;
        }
    }
    items
}

fn clean_title(title: &str) -> String {
    collapse_whitespace(title)
        .trim_end_matches(['.', ';', ':', ','])
        .trim_end()
        .to_string()
}

fn acceptable_title(title: &str, dialect: &Dialect) -> bool {
    let limits = &dialect.limits;
    let len = title.chars().count();
    if !within(len, limits.title_min_chars, limits.title_max_chars) {
        return false;
    }
    if title.chars().next().is_some_and(|c| c.is_lowercase()) {
        return false;
    }
    // The numbering pattern fired on a capability statement.
    !dialect.starts_with_verb(title)
}

/// Extract the two-level knowledge hierarchy from right-column text.
///
/// Dot-free codes are topics; dotted codes become subtopics of the topic
/// sharing their leading segment. Repeated topic codes merge into the first
/// occurrence, so a hierarchy continued on the next page stays intact.
pub fn extract_knowledge(text: &str, dialect: &Dialect) -> KnowledgeExtraction {
    let mut topics: Vec<KnowledgeTopic> = Vec::new();
    let mut by_code: HashMap<String, usize> = HashMap::new();
    let mut orphans = 0usize;

    for item in numbered_items(text, dialect) {
        let title = clean_title(&item.title);
        if !acceptable_title(&title, dialect) {
            debug!(code = %item.code, title = %title, "rejected knowledge item");
            continue;
        }

        match item.code.split_once('.') {
            None => {
                if !by_code.contains_key(&item.code) {
                    by_code.insert(item.code.clone(), topics.len());
                    topics.push(KnowledgeTopic {
                        code: item.code,
                        title,
                        subtopics: Vec::new(),
                    });
                }
            }
            Some((lead, _)) => match by_code.get(lead) {
                Some(&idx) => {
                    let topic = &mut topics[idx];
                    if !topic.subtopics.iter().any(|s| s.code == item.code) {
                        topic.subtopics.push(KnowledgeSubtopic {
                            code: item.code,
                            title,
                        });
                    }
                }
                None => orphans += 1,
            },
        }
    }

    KnowledgeExtraction { topics, orphans }
}
