//! In-memory TF-IDF retrieval over course entities and the methodology corpus.
//!
//! # Scoring
//!
//! For a query, each *distinct* query token that also appears in a document
//! contributes `tf × ln(N / df + 1)`, where `tf` is the token's count in the
//! document, `df` the number of documents containing it, and `N` the index
//! size. Documents with a positive total are returned, highest first; ties
//! keep insertion order.
//!
//! The index is rebuilt from scratch whenever the course set changes. The
//! corpus is small (tens to hundreds of documents), so postings live in a
//! plain `HashMap`.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::methodology;
use crate::models::Course;
use crate::text::{slugify, strip_diacritics};

/// Shortest token kept by [`tokenize`].
pub const MIN_TOKEN_CHARS: usize = 3;

/// What an indexed document stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Course,
    Module,
    Capability,
    Knowledge,
    Methodology,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Course => "course",
            EntityKind::Module => "module",
            EntityKind::Capability => "capability",
            EntityKind::Knowledge => "knowledge",
            EntityKind::Methodology => "methodology",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata returned alongside a hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub kind: EntityKind,
    /// Owning course; `None` for methodology entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    pub title: String,
    pub text: String,
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    pub meta: DocumentMeta,
}

#[derive(Debug, Clone)]
struct IndexedDocument {
    id: String,
    meta: DocumentMeta,
}

/// Inverted index: token → `(document ordinal, term frequency)`.
#[derive(Debug, Clone, Default)]
pub struct RetrievalIndex {
    docs: Vec<IndexedDocument>,
    postings: HashMap<String, Vec<(usize, u32)>>,
}

/// Lowercase, fold diacritics, split on non-alphanumerics and drop short tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    strip_diacritics(&text.to_lowercase())
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

impl RetrievalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Index one document. Cost is linear in its token count.
    pub fn add_document(&mut self, id: impl Into<String>, text: &str, meta: DocumentMeta) {
        let ordinal = self.docs.len();
        let mut bag: HashMap<String, u32> = HashMap::new();
        for token in tokenize(text) {
            *bag.entry(token).or_insert(0) += 1;
        }
        for (token, tf) in bag {
            self.postings.entry(token).or_default().push((ordinal, tf));
        }
        self.docs.push(IndexedDocument {
            id: id.into(),
            meta,
        });
    }

    /// Top `limit` documents for `query`.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        self.search_where(query, limit, |_| true)
    }

    /// Like [`search`](Self::search), keeping only documents accepted by `filter`.
    pub fn search_where<F>(&self, query: &str, limit: usize, filter: F) -> Vec<SearchHit>
    where
        F: Fn(&DocumentMeta) -> bool,
    {
        if limit == 0 || self.docs.is_empty() {
            return Vec::new();
        }
        let n = self.docs.len() as f64;
        let mut seen = HashSet::new();
        let mut scores: HashMap<usize, f64> = HashMap::new();

        for token in tokenize(query) {
            if !seen.insert(token.clone()) {
                continue;
            }
            let Some(postings) = self.postings.get(&token) else {
                continue;
            };
            let idf = (n / postings.len() as f64 + 1.0).ln();
            for &(ordinal, tf) in postings {
                *scores.entry(ordinal).or_insert(0.0) += tf as f64 * idf;
            }
        }

        let mut ranked: Vec<(usize, f64)> = scores
            .into_iter()
            .filter(|(ordinal, score)| *score > 0.0 && filter(&self.docs[*ordinal].meta))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(limit);
        debug!(query, hits = ranked.len(), "index search");

        ranked
            .into_iter()
            .map(|(ordinal, score)| {
                let doc = &self.docs[ordinal];
                SearchHit {
                    id: doc.id.clone(),
                    score,
                    meta: doc.meta.clone(),
                }
            })
            .collect()
    }

    /// Build an index over every course, module, capability and knowledge
    /// topic, optionally followed by the methodology corpus.
    pub fn from_courses(courses: &[Course], include_methodology: bool) -> Self {
        let mut index = Self::new();
        for course in courses {
            index.add_course(course);
        }
        if include_methodology {
            index.add_methodology();
        }
        index
    }

    fn add_course(&mut self, course: &Course) {
        let course_text = format!("{}\n{}", course.name, course.general_competency);
        self.add_document(
            format!("course:{}", course.id),
            &course_text,
            DocumentMeta {
                kind: EntityKind::Course,
                course_id: Some(course.id.clone()),
                module: None,
                title: course.name.clone(),
                text: course.general_competency.clone(),
            },
        );

        for module in &course.modules {
            let module_slug = slugify(&module.name);
            let module_id = format!("module:{}:{}", course.id, module_slug);
            let module_text = format!("{}\n{}\n{}", module.name, module.category, module.objective);
            self.add_document(
                module_id,
                &module_text,
                DocumentMeta {
                    kind: EntityKind::Module,
                    course_id: Some(course.id.clone()),
                    module: Some(module.name.clone()),
                    title: module.name.clone(),
                    text: module.objective.clone(),
                },
            );

            for capability in &module.capabilities {
                self.add_document(
                    format!("capability:{}:{}:{}", course.id, module_slug, capability.code),
                    &capability.description,
                    DocumentMeta {
                        kind: EntityKind::Capability,
                        course_id: Some(course.id.clone()),
                        module: Some(module.name.clone()),
                        title: capability.code.clone(),
                        text: capability.description.clone(),
                    },
                );
            }

            for topic in &module.knowledge {
                let mut text = topic.title.clone();
                for sub in &topic.subtopics {
                    text.push('\n');
                    text.push_str(&sub.title);
                }
                self.add_document(
                    format!("knowledge:{}:{}:{}", course.id, module_slug, topic.code),
                    &text,
                    DocumentMeta {
                        kind: EntityKind::Knowledge,
                        course_id: Some(course.id.clone()),
                        module: Some(module.name.clone()),
                        title: topic.to_string(),
                        text: text.replace('\n', "; "),
                    },
                );
            }
        }
    }

    fn add_methodology(&mut self) {
        for entry in methodology::corpus() {
            self.add_document(
                format!("methodology:{}", entry.key),
                &format!("{}\n{}", entry.title, entry.text),
                DocumentMeta {
                    kind: EntityKind::Methodology,
                    course_id: None,
                    module: None,
                    title: entry.title.to_string(),
                    text: entry.text.to_string(),
                },
            );
        }
    }
}

/// Single writer, many readers wrapper around [`RetrievalIndex`].
#[derive(Debug, Default)]
pub struct SharedIndex {
    inner: RwLock<RetrievalIndex>,
}

impl SharedIndex {
    pub fn new(index: RetrievalIndex) -> Self {
        Self {
            inner: RwLock::new(index),
        }
    }

    /// Swap in a freshly built index.
    pub fn rebuild(&self, index: RetrievalIndex) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = index;
    }

    pub fn add_document(&self, id: impl Into<String>, text: &str, meta: DocumentMeta) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard.add_document(id, text, meta);
    }

    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.search(query, limit)
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Render hits as the bullet list embedded in generation prompts.
pub fn grounding_context(hits: &[SearchHit]) -> String {
    let mut out = String::new();
    for hit in hits {
        out.push_str("- [");
        out.push_str(hit.meta.kind.as_str());
        out.push_str("] ");
        out.push_str(&hit.meta.title);
        if !hit.meta.text.is_empty() && hit.meta.text != hit.meta.title {
            out.push_str(": ");
            out.push_str(&hit.meta.text);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Capability, CapabilityCategory, KnowledgeSubtopic, KnowledgeTopic, Module};
    use chrono::Utc;
    use std::sync::Arc;

    fn meta(title: &str) -> DocumentMeta {
        DocumentMeta {
            kind: EntityKind::Module,
            course_id: Some("c".to_string()),
            module: None,
            title: title.to_string(),
            text: String::new(),
        }
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Lógica de Programação: IF/ELSE em C"),
            vec!["logica", "programacao", "else"]
        );
        assert!(tokenize("a b c").is_empty());
    }

    #[test]
    fn test_unique_term_ranks_first() {
        let mut index = RetrievalIndex::new();
        index.add_document("a", "redes de computadores e cabeamento", meta("a"));
        index.add_document("b", "banco de dados relacional", meta("b"));
        index.add_document("c", "redes sem fio e protocolos", meta("c"));

        let hits = index.search("relacional", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b");
        assert!(hits[0].score > 0.0);
    }

    #[test]
    fn test_ranking_and_ties() {
        let mut index = RetrievalIndex::new();
        index.add_document("one", "redes", meta("one"));
        index.add_document("two", "redes redes", meta("two"));
        index.add_document("three", "redes", meta("three"));
        index.add_document("four", "banco", meta("four"));

        let ids: Vec<_> = index.search("redes", 10).into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["two", "one", "three"]);
        assert_eq!(index.search("redes", 1).len(), 1);
        assert!(index.search("inexistente", 10).is_empty());
        assert!(index.search("", 10).is_empty());
    }

    #[test]
    fn test_repeated_query_tokens_count_once() {
        let mut index = RetrievalIndex::new();
        index.add_document("a", "redes", meta("a"));
        index.add_document("b", "banco", meta("b"));
        let once = index.search("redes", 10)[0].score;
        let twice = index.search("redes redes", 10)[0].score;
        assert!((once - twice).abs() < 1e-12);
    }

    #[test]
    fn test_unrelated_document_keeps_order() {
        let mut index = RetrievalIndex::new();
        index.add_document("a", "algoritmos algoritmos algoritmos", meta("a"));
        index.add_document("b", "algoritmos estruturas", meta("b"));
        index.add_document("c", "algoritmos algoritmos", meta("c"));
        let before: Vec<_> = index.search("algoritmos", 10).into_iter().map(|h| h.id).collect();

        index.add_document("d", "cabeamento estruturado", meta("d"));
        let after: Vec<_> = index.search("algoritmos", 10).into_iter().map(|h| h.id).collect();
        assert_eq!(before, after);
        assert_eq!(after, vec!["a", "c", "b"]);
    }

    fn course() -> Course {
        Course {
            id: "tds".to_string(),
            name: "Técnico em Desenvolvimento de Sistemas".to_string(),
            total_hours: 80,
            general_competency: "Desenvolver sistemas computacionais.".to_string(),
            modules: vec![Module {
                name: "Banco de Dados".to_string(),
                objective: "Modelar e consultar bases relacionais.".to_string(),
                hours: Some(80),
                capabilities: vec![Capability {
                    code: "CT1".to_string(),
                    category: CapabilityCategory::Technical,
                    description: "Elaborar consultas SQL com junções.".to_string(),
                }],
                knowledge: vec![KnowledgeTopic {
                    code: "1".to_string(),
                    title: "NORMALIZAÇÃO".to_string(),
                    subtopics: vec![KnowledgeSubtopic {
                        code: "1.1".to_string(),
                        title: "Formas normais".to_string(),
                    }],
                }],
                ..Module::default()
            }],
            ingested_at: Utc::now(),
            source_fingerprint: String::new(),
        }
    }

    #[test]
    fn test_from_courses() {
        let index = RetrievalIndex::from_courses(&[course()], false);
        assert_eq!(index.len(), 4);

        let hits = index.search("formas normais", 5);
        assert_eq!(hits[0].id, "knowledge:tds:banco-de-dados:1");
        assert_eq!(hits[0].meta.title, "1 NORMALIZAÇÃO");

        let hits = index.search("consultas junções", 5);
        assert_eq!(hits[0].meta.kind, EntityKind::Capability);
        assert_eq!(hits[0].meta.module.as_deref(), Some("Banco de Dados"));

        let with_methodology = RetrievalIndex::from_courses(&[course()], true);
        assert_eq!(with_methodology.len(), 4 + methodology::corpus().len());
        let hits = with_methodology.search("estudo de caso", 3);
        assert_eq!(hits[0].id, "methodology:estudo-de-caso");
    }

    #[test]
    fn test_search_where_filters() {
        let index = RetrievalIndex::from_courses(&[course()], true);
        let hits = index.search_where("situação de aprendizagem banco", 20, |m| {
            m.kind != EntityKind::Methodology
        });
        assert!(hits.iter().all(|h| h.meta.kind != EntityKind::Methodology));
        assert!(!hits.is_empty());
    }

    #[test]
    fn test_shared_index_readers_and_writer() {
        let shared = Arc::new(SharedIndex::default());
        shared.add_document("a", "protocolos de rede", meta("a"));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || shared.search("protocolos", 5).len())
            })
            .collect();
        for r in readers {
            assert_eq!(r.join().unwrap(), 1);
        }

        shared.rebuild(RetrievalIndex::from_courses(&[course()], false));
        assert_eq!(shared.len(), 4);
        assert!(shared.search("protocolos", 5).is_empty());
    }

    #[test]
    fn test_grounding_context() {
        let index = RetrievalIndex::from_courses(&[course()], false);
        let text = grounding_context(&index.search("consultas", 1));
        assert_eq!(
            text,
            "- [capability] CT1: Elaborar consultas SQL com junções.\n"
        );
    }
}
