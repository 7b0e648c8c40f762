//! Prompt construction for answer generation

use crate::types::{EvidenceItem, QueryMode};

/// Instructions steering the generator per query mode
pub fn answer_instructions(mode: QueryMode) -> &'static str {
    match mode {
        QueryMode::PriorArt => {
            "You are a patent prior art search assistant. \
             Analyze the evidence and identify relevant prior art patents. \
             Explain how they relate to the query, referencing claim elements. \
             Use ONLY the evidence. Cite using [#]."
        }
        QueryMode::Infringement => {
            "You are a patent infringement analysis assistant. \
             Analyze the evidence and identify potential infringement issues. \
             Explain which claims may be relevant. \
             Use ONLY the evidence. Cite using [#]."
        }
        QueryMode::Landscape => {
            "You are a patent landscape analysis assistant. \
             Analyze the evidence and provide an overview of the patent landscape. \
             Identify key trends and technologies. \
             Use ONLY the evidence. Cite using [#]."
        }
    }
}

/// Evidence text shown to the generator per item
const EVIDENCE_TEXT_CHARS: usize = 500;

/// Build the answer prompt: the query followed by numbered evidence blocks
/// the model can cite by index.
pub fn build_answer_prompt(query: &str, evidence: &[EvidenceItem]) -> String {
    let mut blocks: Vec<String> = Vec::with_capacity(evidence.len());

    for (idx, item) in evidence.iter().enumerate() {
        let claim = item
            .claim_no
            .map(|n| n.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let title = item.title.as_deref().unwrap_or("N/A");
        let text = truncate_chars(&item.text, EVIDENCE_TEXT_CHARS);

        blocks.push(format!(
            "[{}] Patent: {} | Level: {} | Claim: {}\nTitle: {}\nText: {}",
            idx + 1,
            item.patent_id,
            item.level,
            claim,
            title,
            text,
        ));
    }

    format!(
        "Query: {}\n\nEvidence:\n{}\n\nBased on the evidence above, provide a comprehensive answer to the query.",
        query,
        blocks.join("\n\n"),
    )
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{cut}...")
}
