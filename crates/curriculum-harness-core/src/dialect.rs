//! Extraction dialect: the verb vocabulary, heading patterns, and numbering
//! pattern that drive the lexical extractor, document scanner, and
//! spreadsheet reader.
//!
//! Dialects are data. [`DialectConfig`] is the serializable table (the
//! default targets Brazilian-Portuguese course plans); [`Dialect`] is the
//! compiled form used at extraction time. A TOML file may override any
//! subset of fields:
//!
//! ```toml
//! verbs = ["Aplicar", "Identificar", "Configurar"]
//! module_heading = '(?i)^\s*disciplina\s*:\s*(?P<name>\S.*?)\s*$'
//!
//! [limits]
//! capability_min_chars = 25
//! ```

use std::collections::{HashMap, HashSet};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DialectError;
use crate::models::CapabilityCategory;
use crate::text::fold;

const DEFAULT_VERBS: &[&str] = &[
    "Abordar", "Adotar", "Administrar", "Analisar", "Aplicar", "Apresentar", "Associar",
    "Atualizar", "Avaliar", "Calcular", "Caracterizar", "Classificar", "Codificar", "Comparar",
    "Compreender", "Comunicar", "Conceber", "Configurar", "Conhecer", "Construir", "Consultar",
    "Controlar", "Corrigir", "Criar", "Definir", "Demonstrar", "Depurar", "Descrever",
    "Desenvolver", "Diagnosticar", "Diferenciar", "Dimensionar", "Distinguir", "Documentar",
    "Efetuar", "Elaborar", "Empregar", "Especificar", "Estabelecer", "Estruturar", "Executar",
    "Explicar", "Formular", "Gerenciar", "Identificar", "Implantar", "Implementar", "Instalar",
    "Integrar", "Interpretar", "Investigar", "Manipular", "Manter", "Mensurar", "Modelar",
    "Monitorar", "Operar", "Organizar", "Otimizar", "Parametrizar", "Planejar", "Prever",
    "Programar", "Projetar", "Propor", "Realizar", "Reconhecer", "Registrar", "Relacionar",
    "Representar", "Resolver", "Selecionar", "Testar", "Trabalhar", "Utilizar", "Validar",
    "Verificar",
];

/// Maps a section heading to the capability category that follows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryHeading {
    pub pattern: String,
    pub category: CapabilityCategory,
    /// Code prefix for statements in this category, e.g. `"CT"`.
    pub prefix: String,
}

/// Length bounds and dedup key size, all counted in characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionLimits {
    pub capability_min_chars: usize,
    pub capability_max_chars: usize,
    pub title_min_chars: usize,
    pub title_max_chars: usize,
    pub dedup_prefix_chars: usize,
}

impl Default for ExtractionLimits {
    fn default() -> Self {
        Self {
            capability_min_chars: 20,
            capability_max_chars: 600,
            title_min_chars: 3,
            title_max_chars: 300,
            dedup_prefix_chars: 60,
        }
    }
}

/// Serializable dialect tables. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialectConfig {
    /// Action verbs that open a capability statement.
    pub verbs: Vec<String>,
    pub category_headings: Vec<CategoryHeading>,
    /// Category used before any category heading has been seen.
    pub default_category: CapabilityCategory,
    /// Opens a module section; must capture `name`.
    pub module_heading: String,
    /// Opens the module objective; may capture `text`.
    pub objective_heading: String,
    /// Opens the course's general competency; may capture `text`.
    pub competency_heading: String,
    /// Marks the start of the knowledge column; the line itself carries no content.
    pub knowledge_heading: String,
    /// Sections whose content is ignored until the next heading (references, facilities).
    pub stop_heading: String,
    /// Numbered knowledge item; group 1 is the dotted code.
    pub numbered_item: String,
    /// Bullet or enumeration marker stripped from the start of a line.
    pub bullet_prefix: String,
    /// Spreadsheet header rows, matched against the module name cell.
    pub header_row: String,
    /// Spreadsheet summary rows, matched against every cell.
    pub summary_row: String,
    pub limits: ExtractionLimits,
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self {
            verbs: DEFAULT_VERBS.iter().map(|v| v.to_string()).collect(),
            category_headings: vec![
                CategoryHeading {
                    pattern: r"(?i)^\s*capacidades\s+b[áa]sicas".to_string(),
                    category: CapabilityCategory::Basic,
                    prefix: "CB".to_string(),
                },
                CategoryHeading {
                    pattern: r"(?i)^\s*fundamentos\s+t[ée]cnicos(?:\s+e\s+cient[íi]ficos)?".to_string(),
                    category: CapabilityCategory::Basic,
                    prefix: "CB".to_string(),
                },
                CategoryHeading {
                    pattern: r"(?i)^\s*capacidades\s+t[ée]cnicas".to_string(),
                    category: CapabilityCategory::Technical,
                    prefix: "CT".to_string(),
                },
                CategoryHeading {
                    pattern: r"(?i)^\s*capacidades\s+socioemocionais".to_string(),
                    category: CapabilityCategory::Socioemotional,
                    prefix: "CS".to_string(),
                },
            ],
            default_category: CapabilityCategory::Technical,
            module_heading: r"(?i)^\s*(?:unidade\s+curricular|m[óo]dulo)\s*(?:\d+\s*)?[:\-–]\s*(?P<name>\S.*?)(?:\s+carga\s+hor[áa]ria\b.*)?\s*$".to_string(),
            objective_heading: r"(?i)^\s*objetivos?(?:\s+gera(?:l|is))?\s*(?:[:\-–]\s*(?P<text>.*))?$".to_string(),
            competency_heading: r"(?i)^\s*compet[êe]ncia\s+geral\s*(?:[:\-–]\s*(?P<text>.*))?$".to_string(),
            knowledge_heading: r"(?i)^\s*conhecimentos(?:\s+(?:t[ée]cnicos|b[áa]sicos))?\s*:?\s*$".to_string(),
            stop_heading: r"(?i)^\s*(?:refer[êe]ncias(?:\s+bibliogr[áa]ficas)?|bibliografia|ambientes?\s+pedag[óo]gicos|infraestrutura)\b".to_string(),
            numbered_item: r"(?:^|\s)(\d{1,2}(?:\.\d{1,2}){0,3})\.?\s+".to_string(),
            bullet_prefix: r"^\s*(?:[•·▪◦●○\-–—*]+|\(?[a-zA-Z0-9]{1,2}[.)])\s*".to_string(),
            header_row: r"(?i)^\s*(?:unidades?\s+curricular(?:es)?|componentes?(?:\s+curricular(?:es)?)?|m[óo]dulos?|nome|disciplinas?)\s*$".to_string(),
            summary_row: r"(?i)^\s*(?:(?:sub)?total\b|carga\s+hor[áa]ria\s+total)".to_string(),
            limits: ExtractionLimits::default(),
        }
    }
}

impl DialectConfig {
    /// Parse a dialect table from TOML. Missing fields keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, DialectError> {
        Ok(toml::from_str(s)?)
    }

    /// Compile the patterns into a [`Dialect`].
    pub fn compile(&self) -> Result<Dialect, DialectError> {
        let verbs: Vec<String> = self
            .verbs
            .iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        if verbs.is_empty() {
            return Err(DialectError::EmptyVocabulary);
        }

        let verb_keys: HashSet<String> = verbs.iter().map(|v| fold(v)).collect();

        // Statements open with a capitalised verb; accept Title and UPPER forms.
        let mut forms: Vec<String> = Vec::with_capacity(verbs.len() * 2);
        for v in &verbs {
            let title = title_case(v);
            let upper = v.to_uppercase();
            forms.push(regex::escape(&title));
            if upper != title {
                forms.push(regex::escape(&upper));
            }
        }
        forms.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        forms.dedup();
        let verb_start = compile("verbs", &format!(r"\b(?:{})\b", forms.join("|")))?;

        let mut category_headings = Vec::with_capacity(self.category_headings.len());
        let mut prefixes: HashMap<CapabilityCategory, String> = HashMap::new();
        for h in &self.category_headings {
            category_headings.push((compile("category_headings", &h.pattern)?, h.category));
            prefixes
                .entry(h.category)
                .or_insert_with(|| h.prefix.clone());
        }

        Ok(Dialect {
            verb_keys,
            verb_start,
            category_headings,
            prefixes,
            default_category: self.default_category,
            module_heading: compile("module_heading", &self.module_heading)?,
            objective_heading: compile("objective_heading", &self.objective_heading)?,
            competency_heading: compile("competency_heading", &self.competency_heading)?,
            knowledge_heading: compile("knowledge_heading", &self.knowledge_heading)?,
            stop_heading: compile("stop_heading", &self.stop_heading)?,
            numbered_item: compile("numbered_item", &self.numbered_item)?,
            bullet_prefix: compile("bullet_prefix", &self.bullet_prefix)?,
            header_row: compile("header_row", &self.header_row)?,
            summary_row: compile("summary_row", &self.summary_row)?,
            limits: self.limits.clone(),
        })
    }
}

fn compile(field: &str, pattern: &str) -> Result<Regex, DialectError> {
    Regex::new(pattern).map_err(|source| DialectError::InvalidPattern {
        field: field.to_string(),
        source,
    })
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

/// A compiled dialect, ready for extraction.
#[derive(Debug, Clone)]
pub struct Dialect {
    verb_keys: HashSet<String>,
    verb_start: Regex,
    category_headings: Vec<(Regex, CapabilityCategory)>,
    prefixes: HashMap<CapabilityCategory, String>,
    pub default_category: CapabilityCategory,
    module_heading: Regex,
    objective_heading: Regex,
    competency_heading: Regex,
    knowledge_heading: Regex,
    stop_heading: Regex,
    numbered_item: Regex,
    bullet_prefix: Regex,
    header_row: Regex,
    summary_row: Regex,
    pub limits: ExtractionLimits,
}

impl Default for Dialect {
    fn default() -> Self {
        DialectConfig::default()
            .compile()
            .expect("built-in dialect patterns are valid")
    }
}

/// A heading-like line recognised by the dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Heading {
    Module(String),
    Objective(Option<String>),
    Competency(Option<String>),
}

impl Dialect {
    /// Matches of capitalised vocabulary verbs in `text`.
    pub(crate) fn verb_starts<'t>(&'t self, text: &'t str) -> impl Iterator<Item = usize> + 't {
        self.verb_start.find_iter(text).map(|m| m.start())
    }

    /// True if `word` is a vocabulary verb (case- and accent-insensitive).
    pub fn is_verb(&self, word: &str) -> bool {
        self.verb_keys.contains(&fold(word))
    }

    /// True if the first word of `text` is a vocabulary verb.
    ///
    /// Only the leading alphabetic run counts, so enclitic forms such as
    /// `Comunicar-se` resolve to their verb.
    pub fn starts_with_verb(&self, text: &str) -> bool {
        text.split_whitespace()
            .next()
            .map(|w| w.trim_start_matches(|c: char| !c.is_alphabetic()))
            .and_then(|w| w.split(|c: char| !c.is_alphabetic()).next())
            .is_some_and(|w| !w.is_empty() && self.is_verb(w))
    }

    /// Capability category announced by `line`, if it is a category heading.
    pub fn category_heading(&self, line: &str) -> Option<CapabilityCategory> {
        self.category_headings
            .iter()
            .find(|(re, _)| re.is_match(line))
            .map(|(_, cat)| *cat)
    }

    /// Code prefix for a capability category.
    pub fn prefix(&self, category: CapabilityCategory) -> &str {
        match self.prefixes.get(&category) {
            Some(p) => p.as_str(),
            None => match category {
                CapabilityCategory::Basic => "CB",
                CapabilityCategory::Technical => "CT",
                CapabilityCategory::Socioemotional => "CS",
            },
        }
    }

    /// Recognise module, objective, and competency headings on a full row.
    pub fn heading(&self, line: &str) -> Option<Heading> {
        if let Some(caps) = self.module_heading.captures(line) {
            if let Some(name) = caps.name("name") {
                let name = name.as_str().trim();
                if !name.is_empty() {
                    return Some(Heading::Module(name.to_string()));
                }
            }
        }
        if let Some(caps) = self.objective_heading.captures(line) {
            return Some(Heading::Objective(captured_text(&caps)));
        }
        if let Some(caps) = self.competency_heading.captures(line) {
            return Some(Heading::Competency(captured_text(&caps)));
        }
        None
    }

    pub fn is_knowledge_heading(&self, line: &str) -> bool {
        self.knowledge_heading.is_match(line)
    }

    pub fn is_stop_heading(&self, line: &str) -> bool {
        self.stop_heading.is_match(line)
    }

    /// `(start, end, code)` of each numbered marker in `line`. `end` is where the title begins.
    pub(crate) fn numbered_items<'t>(
        &'t self,
        line: &'t str,
    ) -> impl Iterator<Item = (usize, usize, &'t str)> + 't {
        self.numbered_item.captures_iter(line).filter_map(|caps| {
            let whole = caps.get(0)?;
            let code = caps.get(1)?;
            Some((code.start(), whole.end(), code.as_str()))
        })
    }

    /// Remove a leading bullet or enumeration marker.
    pub fn strip_bullet<'t>(&self, line: &'t str) -> &'t str {
        match self.bullet_prefix.find(line) {
            Some(m) => &line[m.end()..],
            None => line.trim_start(),
        }
    }

    pub fn is_header_cell(&self, cell: &str) -> bool {
        self.header_row.is_match(cell)
    }

    pub fn is_summary_cell(&self, cell: &str) -> bool {
        self.summary_row.is_match(cell)
    }
}

fn captured_text(caps: &regex::Captures<'_>) -> Option<String> {
    caps.name("text")
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_compiles() {
        let d = DialectConfig::default().compile().unwrap();
        assert!(d.is_verb("aplicar"));
        assert!(d.is_verb("APLICAR"));
        assert!(!d.is_verb("aplicação"));
    }

    #[test]
    fn test_headings() {
        let d = Dialect::default();
        assert_eq!(
            d.heading("UNIDADE CURRICULAR: Lógica de Programação  Carga Horária: 80h"),
            Some(Heading::Module("Lógica de Programação".to_string()))
        );
        assert_eq!(
            d.heading("Módulo 2 - Banco de Dados"),
            Some(Heading::Module("Banco de Dados".to_string()))
        );
        assert_eq!(
            d.heading("Objetivo: Desenvolver algoritmos."),
            Some(Heading::Objective(Some("Desenvolver algoritmos.".to_string())))
        );
        assert_eq!(d.heading("Objetivo Geral"), Some(Heading::Objective(None)));
        assert_eq!(d.heading("Objetivos de aprendizagem da turma"), None);
        assert_eq!(
            d.heading("Competência Geral: Desenvolver sistemas"),
            Some(Heading::Competency(Some("Desenvolver sistemas".to_string())))
        );
    }

    #[test]
    fn test_category_headings() {
        let d = Dialect::default();
        assert_eq!(
            d.category_heading("Capacidades Básicas"),
            Some(CapabilityCategory::Basic)
        );
        assert_eq!(
            d.category_heading("CAPACIDADES TÉCNICAS"),
            Some(CapabilityCategory::Technical)
        );
        assert_eq!(d.category_heading("Aplicar técnicas"), None);
        assert_eq!(d.prefix(CapabilityCategory::Technical), "CT");
        assert_eq!(d.prefix(CapabilityCategory::Basic), "CB");
    }

    #[test]
    fn test_toml_override_keeps_defaults() {
        let cfg = DialectConfig::from_toml_str(
            r#"
verbs = ["Soldar", "Medir"]

[limits]
capability_min_chars = 10
"#,
        )
        .unwrap();
        assert_eq!(cfg.verbs, vec!["Soldar", "Medir"]);
        assert_eq!(cfg.limits.capability_min_chars, 10);
        assert_eq!(cfg.limits.capability_max_chars, 600);
        let d = cfg.compile().unwrap();
        assert!(d.is_verb("soldar"));
        assert!(!d.is_verb("aplicar"));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let cfg = DialectConfig {
            module_heading: "(unclosed".to_string(),
            ..DialectConfig::default()
        };
        match cfg.compile() {
            Err(DialectError::InvalidPattern { field, .. }) => assert_eq!(field, "module_heading"),
            other => panic!("expected InvalidPattern, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_empty_vocabulary_rejected() {
        let cfg = DialectConfig {
            verbs: vec!["  ".to_string()],
            ..DialectConfig::default()
        };
        assert!(matches!(cfg.compile(), Err(DialectError::EmptyVocabulary)));
    }

    #[test]
    fn test_strip_bullet() {
        let d = Dialect::default();
        assert_eq!(d.strip_bullet("• Aplicar normas"), "Aplicar normas");
        assert_eq!(d.strip_bullet("a) Aplicar normas"), "Aplicar normas");
        assert_eq!(d.strip_bullet("  Aplicar normas"), "Aplicar normas");
    }

    #[test]
    fn test_starts_with_verb_enclitic() {
        let d = Dialect::default();
        assert!(d.starts_with_verb("Comunicar-se de forma clara com a equipe."));
        assert!(d.starts_with_verb("\"Aplicar\" normas"));
        assert!(!d.starts_with_verb("Comunicação entre equipes"));
        assert!(!d.starts_with_verb("-se de forma clara"));
        assert!(!d.starts_with_verb(""));
    }
}
