//! Multi-source reconciliation: attach document-derived enrichment to the
//! spreadsheet's authoritative module list.
//!
//! Matching is greedy and order-stable. For each spreadsheet module, in
//! spreadsheet order, the first document module whose folded name contains
//! the first `prefix_chars` characters of the spreadsheet name (or whose own
//! prefix is contained in the spreadsheet name) wins. There is no global
//! assignment: two spreadsheet modules sharing a long prefix can both pair
//! with the same document module, which is reported as a warning.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{DocumentModule, Module};
use crate::text::{char_prefix, fold};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchParams {
    /// Number of leading characters compared between the two names.
    pub prefix_chars: usize,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self { prefix_chars: 20 }
    }
}

/// Outcome of reconciling both sources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub modules: Vec<Module>,
    /// For each output module, the index of the document module it took enrichment from.
    pub pairing: Vec<Option<usize>>,
    pub warnings: Vec<String>,
}

fn names_match(sheet_key: &str, doc_key: &str, prefix_chars: usize) -> bool {
    let sheet_prefix = char_prefix(sheet_key, prefix_chars);
    let doc_prefix = char_prefix(doc_key, prefix_chars);
    (!sheet_prefix.is_empty() && doc_key.contains(sheet_prefix))
        || (!doc_prefix.is_empty() && sheet_key.contains(doc_prefix))
}

/// Index of the first document module matching `name`.
pub fn find_match(name: &str, doc_modules: &[DocumentModule], params: &MatchParams) -> Option<usize> {
    let key = fold(name);
    doc_modules
        .iter()
        .position(|d| names_match(&key, &fold(&d.name), params.prefix_chars))
}

/// Pair every spreadsheet module with document enrichment.
pub fn reconcile(
    sheet_modules: Vec<Module>,
    doc_modules: &[DocumentModule],
    params: &MatchParams,
) -> Reconciliation {
    let mut warnings = Vec::new();
    let mut pairing = Vec::with_capacity(sheet_modules.len());
    let mut uses: HashMap<usize, usize> = HashMap::new();

    let modules: Vec<Module> = sheet_modules
        .into_iter()
        .map(|mut module| {
            let found = find_match(&module.name, doc_modules, params);
            match found {
                Some(idx) => {
                    let doc = &doc_modules[idx];
                    debug!(sheet = %module.name, document = %doc.name, "matched module");
                    module.objective = doc.objective.clone();
                    module.capabilities = doc.capabilities.clone();
                    module.knowledge = doc.knowledge.clone();
                    *uses.entry(idx).or_insert(0) += 1;
                }
                None => {
                    warn!(module = %module.name, "no document section for module");
                    warnings.push(format!(
                        "module '{}' has no matching section in the document; capabilities and knowledge left empty",
                        module.name
                    ));
                }
            }
            pairing.push(found);
            module
        })
        .collect();

    for (idx, doc) in doc_modules.iter().enumerate() {
        match uses.get(&idx).copied().unwrap_or(0) {
            0 => warnings.push(format!(
                "document section '{}' did not match any spreadsheet module",
                doc.name
            )),
            1 => {}
            n => warnings.push(format!(
                "document section '{}' was attached to {} spreadsheet modules",
                doc.name, n
            )),
        }
    }

    Reconciliation {
        modules,
        pairing,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Capability, CapabilityCategory};

    fn sheet(name: &str) -> Module {
        Module {
            name: name.to_string(),
            hours: Some(40),
            ..Module::default()
        }
    }

    fn doc(name: &str, capability: &str) -> DocumentModule {
        DocumentModule {
            name: name.to_string(),
            objective: format!("Objetivo de {}", name),
            capabilities: vec![Capability {
                code: "CT1".to_string(),
                category: CapabilityCategory::Technical,
                description: capability.to_string(),
            }],
            knowledge: Vec::new(),
        }
    }

    #[test]
    fn test_approximate_names_match() {
        let docs = vec![
            doc("BANCO DE DADOS", "Modelar bancos de dados relacionais."),
            doc("Lógica de Programação e Algoritmos", "Aplicar estruturas de repetição."),
        ];
        let result = reconcile(
            vec![sheet("Logica de Programacao"), sheet("Banco de Dados")],
            &docs,
            &MatchParams::default(),
        );
        assert_eq!(result.pairing, vec![Some(1), Some(0)]);
        assert_eq!(result.modules[0].name, "Logica de Programacao");
        assert_eq!(result.modules[0].hours, Some(40));
        assert_eq!(
            result.modules[0].capabilities[0].description,
            "Aplicar estruturas de repetição."
        );
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_document_prefix_inside_sheet_name() {
        let docs = vec![doc("Redes", "Configurar redes locais cabeadas.")];
        let result = reconcile(
            vec![sheet("Redes de Computadores")],
            &docs,
            &MatchParams::default(),
        );
        assert_eq!(result.pairing, vec![Some(0)]);
    }

    #[test]
    fn test_unmatched_sheet_module_kept_empty() {
        let docs = vec![doc("Redes", "Configurar redes locais cabeadas.")];
        let result = reconcile(
            vec![sheet("Empreendedorismo"), sheet("Redes")],
            &docs,
            &MatchParams::default(),
        );
        assert_eq!(result.modules.len(), 2);
        assert!(result.modules[0].capabilities.is_empty());
        assert!(result.modules[0].objective.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("Empreendedorismo"));
    }

    #[test]
    fn test_first_match_wins_for_shared_prefixes() {
        let docs = vec![
            doc("Programação Orientada a Objetos I", "Aplicar encapsulamento em classes."),
            doc("Programação Orientada a Objetos II", "Aplicar polimorfismo em hierarquias."),
        ];
        let result = reconcile(
            vec![
                sheet("Programação Orientada a Objetos I"),
                sheet("Programação Orientada a Objetos II"),
            ],
            &docs,
            &MatchParams::default(),
        );
        assert_eq!(result.pairing, vec![Some(0), Some(0)]);
        assert!(result.warnings.iter().any(|w| w.contains("attached to 2")));
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("Objetos II") && w.contains("did not match")));
    }

    #[test]
    fn test_stable_pairing() {
        let docs = vec![doc("Redes", "Configurar redes."), doc("Banco de Dados", "Modelar dados.")];
        let sheets = vec![sheet("Banco de Dados"), sheet("Redes"), sheet("Ética")];
        let a = reconcile(sheets.clone(), &docs, &MatchParams::default());
        let b = reconcile(sheets, &docs, &MatchParams::default());
        assert_eq!(a, b);
    }
}
