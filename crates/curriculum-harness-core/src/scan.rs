//! Document scanning: a fold over segmented pages that routes every row to
//! the module, capability category, and column it belongs to.
//!
//! Section context (which module heading and which capability category were
//! seen last) carries across page boundaries, so extraction can only run
//! once every page has been absorbed. [`scan_document`] is that barrier.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::dialect::{Dialect, Heading};
use crate::extract::{extract_knowledge, CapabilityCollector};
use crate::models::{CapabilityCategory, DocumentModule};
use crate::segment::SegmentedPage;
use crate::text::{collapse_whitespace, fold};

/// Text gathered for one module before extraction.
#[derive(Debug, Clone, Default)]
struct ModuleDraft {
    name: String,
    first_page: u32,
    objective: Vec<String>,
    blocks: Vec<(CapabilityCategory, Vec<String>)>,
    knowledge: Vec<String>,
}

impl ModuleDraft {
    fn new(name: String, page: u32) -> Self {
        Self {
            name,
            first_page: page,
            ..Self::default()
        }
    }

    fn push_capability_line(&mut self, category: CapabilityCategory, line: &str) {
        match self.blocks.last_mut() {
            Some((cat, lines)) if *cat == category => lines.push(line.to_string()),
            _ => self.blocks.push((category, vec![line.to_string()])),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    Content,
    Objective,
    Competency,
    Ignore,
}

/// Running state of the page fold.
#[derive(Debug, Clone)]
pub struct ScanState {
    drafts: Vec<ModuleDraft>,
    by_name: HashMap<String, usize>,
    current: Option<usize>,
    category: CapabilityCategory,
    capture: Capture,
    competency: Vec<String>,
    pages: usize,
}

impl ScanState {
    pub fn new(dialect: &Dialect) -> Self {
        Self {
            drafts: Vec::new(),
            by_name: HashMap::new(),
            current: None,
            category: dialect.default_category,
            capture: Capture::Content,
            competency: Vec::new(),
            pages: 0,
        }
    }

    fn open_module(&mut self, name: String, page: u32, dialect: &Dialect) {
        let key = fold(&name);
        match self.by_name.get(&key).copied() {
            // A heading repeated at the top of the next page continues the section.
            Some(idx) if self.current == Some(idx) => {}
            Some(idx) => {
                self.current = Some(idx);
                self.category = dialect.default_category;
            }
            None => {
                debug!(module = %name, page, "module heading");
                self.by_name.insert(key, self.drafts.len());
                self.current = Some(self.drafts.len());
                self.drafts.push(ModuleDraft::new(name, page));
                self.category = dialect.default_category;
            }
        }
        self.capture = Capture::Content;
    }

    fn current_draft(&mut self) -> Option<&mut ModuleDraft> {
        self.current.and_then(|i| self.drafts.get_mut(i))
    }

    /// Absorb one page and return the new state.
    pub fn absorb(mut self, page: &SegmentedPage, dialect: &Dialect) -> Self {
        self.pages += 1;
        for row in &page.rows {
            let joined = row.joined();

            if let Some(heading) = dialect.heading(&joined) {
                match heading {
                    Heading::Module(name) => self.open_module(name, page.page, dialect),
                    Heading::Objective(text) => {
                        self.capture = Capture::Objective;
                        if let (Some(text), Some(draft)) = (text, self.current_draft()) {
                            draft.objective.push(text);
                        }
                    }
                    Heading::Competency(text) => {
                        self.capture = Capture::Competency;
                        self.competency.extend(text);
                    }
                }
                continue;
            }

            if dialect.is_stop_heading(&joined) {
                self.capture = Capture::Ignore;
                continue;
            }

            let mut left = row.left.as_str();
            let mut right = row.right.as_str();
            if let Some(category) = dialect.category_heading(left) {
                self.category = category;
                self.capture = Capture::Content;
                left = "";
            }
            if dialect.is_knowledge_heading(left) {
                self.capture = Capture::Content;
                left = "";
            }
            if dialect.is_knowledge_heading(right) {
                self.capture = Capture::Content;
                right = "";
            }

            match self.capture {
                Capture::Ignore => {}
                Capture::Competency => self.competency.push(joined),
                Capture::Objective => {
                    if let Some(draft) = self.current_draft() {
                        draft.objective.push(joined);
                    }
                }
                Capture::Content => {
                    let category = self.category;
                    if let Some(draft) = self.current_draft() {
                        if !left.is_empty() {
                            draft.push_capability_line(category, left);
                        }
                        if !right.is_empty() {
                            draft.knowledge.push(right.to_string());
                        }
                    }
                }
            }
        }
        self
    }

    /// Run extraction over every draft. This is the barrier after the fold.
    pub fn finish(self, dialect: &Dialect) -> DocumentScan {
        let mut warnings = Vec::new();
        let modules: Vec<DocumentModule> = self
            .drafts
            .into_iter()
            .map(|draft| {
                let mut collector = CapabilityCollector::new();
                for (category, lines) in &draft.blocks {
                    collector.collect(&lines.join("\n"), *category, dialect);
                }
                let knowledge = extract_knowledge(&draft.knowledge.join("\n"), dialect);
                if knowledge.orphans > 0 {
                    warn!(
                        module = %draft.name,
                        page = draft.first_page,
                        orphans = knowledge.orphans,
                        "dropped orphan subtopics"
                    );
                    warnings.push(format!(
                        "module '{}' (from page {}): {} knowledge subtopic(s) had no parent topic and were dropped",
                        draft.name, draft.first_page, knowledge.orphans
                    ));
                }
                DocumentModule {
                    objective: collapse_whitespace(&draft.objective.join(" ")),
                    name: draft.name,
                    capabilities: collector.finish(),
                    knowledge: knowledge.topics,
                }
            })
            .collect();

        DocumentScan {
            modules,
            general_competency: collapse_whitespace(&self.competency.join(" ")),
            pages: self.pages,
            warnings,
        }
    }
}

/// Everything recovered from the free-form document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentScan {
    pub modules: Vec<DocumentModule>,
    pub general_competency: String,
    pub pages: usize,
    pub warnings: Vec<String>,
}

/// Scan segmented pages in page-number order and extract every module.
pub fn scan_document(pages: &[SegmentedPage], dialect: &Dialect) -> DocumentScan {
    let mut ordered: Vec<&SegmentedPage> = pages.iter().collect();
    ordered.sort_by_key(|p| p.page);
    ordered
        .into_iter()
        .fold(ScanState::new(dialect), |state, page| state.absorb(page, dialect))
        .finish(dialect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Row;

    fn row(left: &str, right: &str) -> Row {
        Row {
            line: 0,
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    fn page(n: u32, rows: Vec<Row>) -> SegmentedPage {
        SegmentedPage { page: n, rows }
    }

    fn sample_pages() -> Vec<SegmentedPage> {
        vec![
            page(
                2,
                vec![
                    row("Unidade Curricular: Lógica de", "Programação Carga Horária: 80h"),
                    row("Capacidades Técnicas", "Conhecimentos"),
                    row("Aplicar estruturas de repetição para", "1 ALGORITMOS"),
                    row("resolver problemas sequenciais.", "1.1 Variáveis"),
                    row("", "1.2 Operadores"),
                ],
            ),
            page(
                1,
                vec![
                    row("Competência Geral: Desenvolver sistemas", ""),
                    row("computacionais seguindo normas.", ""),
                    row("Unidade Curricular: Lógica de", "Programação"),
                    row("Objetivo: Desenvolver o raciocínio", ""),
                    row("lógico aplicado à programação.", ""),
                    row("Capacidades Básicas", ""),
                    row("Identificar os tipos de dados primitivos.", ""),
                ],
            ),
            page(
                3,
                vec![
                    row("Unidade Curricular: Lógica de", "Programação"),
                    row("Utilizar ambientes de desenvolvimento integrado.", "2 ESTRUTURAS"),
                    row("", "2.1 Decisão"),
                    row("Referências", ""),
                    row("1. SOBRENOME, Autor. Título do livro.", "3 IGNORADO"),
                    row("Unidade Curricular: Banco de Dados", ""),
                    row("Modelar bancos de dados relacionais normalizados.", "1 MODELAGEM"),
                ],
            ),
        ]
    }

    #[test]
    fn test_scan_carries_state_across_pages() {
        let dialect = Dialect::default();
        let scan = scan_document(&sample_pages(), &dialect);
        assert_eq!(scan.pages, 3);
        assert_eq!(
            scan.general_competency,
            "Desenvolver sistemas computacionais seguindo normas."
        );
        assert_eq!(scan.modules.len(), 2);

        let logic = &scan.modules[0];
        assert_eq!(logic.name, "Lógica de Programação");
        assert_eq!(
            logic.objective,
            "Desenvolver o raciocínio lógico aplicado à programação."
        );
        let codes: Vec<&str> = logic.capabilities.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["CB1", "CT1", "CT2"]);
        assert_eq!(
            logic.capabilities[1].description,
            "Aplicar estruturas de repetição para resolver problemas sequenciais."
        );
        let topics: Vec<String> = logic.knowledge.iter().map(|t| t.to_string()).collect();
        assert_eq!(topics, vec!["1 ALGORITMOS", "2 ESTRUTURAS"]);
        assert_eq!(logic.knowledge[0].subtopics.len(), 2);

        let db = &scan.modules[1];
        assert_eq!(db.name, "Banco de Dados");
        assert_eq!(db.capabilities.len(), 1);
        assert_eq!(db.capabilities[0].code, "CT1");
        assert_eq!(db.knowledge.len(), 1);
    }

    #[test]
    fn test_text_before_first_module_is_not_attributed() {
        let dialect = Dialect::default();
        let pages = vec![page(
            1,
            vec![
                row("Aplicar normas de segurança em laboratório.", "1 NORMAS"),
                row("Unidade Curricular: Redes", ""),
            ],
        )];
        let scan = scan_document(&pages, &dialect);
        assert_eq!(scan.modules.len(), 1);
        assert!(scan.modules[0].capabilities.is_empty());
        assert!(scan.modules[0].knowledge.is_empty());
    }

    #[test]
    fn test_orphans_become_warnings() {
        let dialect = Dialect::default();
        let pages = vec![
            page(
                4,
                vec![row("Unidade Curricular: Redes", ""), row("", "4.1 Topologias")],
            ),
            page(5, vec![row("", "4.2 Cabeamento")]),
        ];
        let scan = scan_document(&pages, &dialect);
        assert_eq!(scan.warnings.len(), 1);
        assert!(scan.warnings[0].contains("'Redes' (from page 4)"));
        assert!(scan.warnings[0].contains("2 knowledge subtopic(s)"));
    }

    #[test]
    fn test_no_modules() {
        let dialect = Dialect::default();
        let scan = scan_document(&[page(1, vec![row("Texto solto", "")])], &dialect);
        assert!(scan.modules.is_empty());
    }
}
