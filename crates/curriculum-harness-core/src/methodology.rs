//! Fixed methodology corpus indexed next to course entities.
//!
//! These entries describe the teaching strategies that generated lesson
//! plans are expected to follow. They are static reference text, so they
//! live in the binary rather than in the course store.

/// One methodology reference entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodologyEntry {
    pub key: &'static str,
    pub title: &'static str,
    pub text: &'static str,
}

const CORPUS: &[MethodologyEntry] = &[
    MethodologyEntry {
        key: "situacao-de-aprendizagem",
        title: "Situação de aprendizagem",
        text: "A situação de aprendizagem é a estratégia central do planejamento: \
               um contexto desafiador, próximo da realidade profissional, que mobiliza \
               capacidades básicas, técnicas e socioemocionais ao mesmo tempo. Deve \
               apresentar contextualização, desafio, resultados esperados e critérios \
               de avaliação.",
    },
    MethodologyEntry {
        key: "estudo-de-caso",
        title: "Estudo de caso",
        text: "O estudo de caso apresenta uma situação real ou simulada do mundo do \
               trabalho para análise. Os alunos identificam o problema, levantam \
               hipóteses, comparam alternativas e justificam a solução escolhida \
               com base nos conhecimentos do módulo.",
    },
    MethodologyEntry {
        key: "projeto",
        title: "Projeto",
        text: "O projeto organiza a aprendizagem em torno da construção de um produto \
               ou serviço com entregas parciais. Envolve planejamento de etapas, \
               divisão de responsabilidades, prototipação, testes e apresentação \
               final dos resultados.",
    },
    MethodologyEntry {
        key: "pesquisa-aplicada",
        title: "Pesquisa aplicada",
        text: "A pesquisa aplicada conduz os alunos a investigar tecnologias, normas \
               e fontes técnicas para responder a uma pergunta concreta. O docente \
               orienta a seleção de fontes confiáveis e a síntese das descobertas.",
    },
    MethodologyEntry {
        key: "desafio",
        title: "Desafio",
        text: "O desafio propõe um problema de curta duração com restrições claras \
               de tempo e recursos. Estimula a tomada de decisão, o trabalho em \
               equipe e a aplicação imediata das capacidades técnicas.",
    },
    MethodologyEntry {
        key: "avaliacao-formativa",
        title: "Avaliação formativa",
        text: "A avaliação formativa acompanha o desenvolvimento das capacidades ao \
               longo das atividades. Utiliza critérios críticos e desejáveis, \
               instrumentos como listas de verificação e rubricas, e devolutivas \
               frequentes para orientar a recuperação da aprendizagem.",
    },
    MethodologyEntry {
        key: "criterios-de-avaliacao",
        title: "Critérios de avaliação",
        text: "Os critérios de avaliação derivam das capacidades do módulo. Critérios \
               críticos indicam o desempenho mínimo indispensável; critérios \
               desejáveis indicam desempenho que agrega qualidade à entrega.",
    },
    MethodologyEntry {
        key: "mediacao-docente",
        title: "Mediação docente",
        text: "O docente atua como mediador: apresenta a situação de aprendizagem, \
               problematiza, acompanha as equipes e sistematiza os conhecimentos \
               ao final de cada etapa, relacionando a prática às bases teóricas.",
    },
];

/// The full methodology corpus, in a fixed order.
pub fn corpus() -> &'static [MethodologyEntry] {
    CORPUS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_keys_are_unique() {
        let keys: HashSet<_> = corpus().iter().map(|e| e.key).collect();
        assert_eq!(keys.len(), corpus().len());
    }
}
