//! Heuristic GEO and fanout scores displayed next to generated answers.
//!
//! Both are plain string matching. They are meant for relative comparison in the UI,
//! nothing more.

use std::collections::BTreeSet;

const STOPWORDS: &[&str] = &[
    "about", "after", "also", "been", "before", "being", "does", "from", "have", "into",
    "like", "more", "most", "much", "should", "some", "than", "that", "their", "them",
    "then", "there", "these", "they", "this", "what", "when", "where", "which", "while",
    "will", "with", "would", "your",
];

/// Scores how well an answer is positioned for generative-engine visibility (0..=100).
pub fn geo_score(answer: &str, target_keywords: &[String]) -> f64 {
    let lower = answer.to_lowercase();

    let keywords: Vec<String> = target_keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    let keyword_part = if keywords.is_empty() {
        40.0
    } else {
        let hits = keywords.iter().filter(|k| lower.contains(k.as_str())).count();
        40.0 * hits as f64 / keywords.len() as f64
    };

    let has_list = answer.lines().any(|l| {
        let t = l.trim_start();
        t.starts_with("- ")
            || t.starts_with("* ")
            || t.split_once('.').is_some_and(|(n, _)| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
    });
    let sentences = answer
        .split(['.', '!', '?'])
        .filter(|s| s.split_whitespace().count() >= 3)
        .count();
    let structure_part = if has_list || sentences >= 3 { 20.0 } else { 0.0 };

    let citation_part = if lower.contains("http://") || lower.contains("https://") || lower.contains("according to") {
        20.0
    } else {
        0.0
    };

    let words = answer.split_whitespace().count();
    let length_part = 20.0 * (words.min(150) as f64 / 150.0);

    ((keyword_part + structure_part + citation_part + length_part) * 100.0).round() / 100.0
}

/// Distinct significant terms of a text: lowercase, alphanumeric, at least four chars,
/// stopwords removed.
fn significant_terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 4)
        .map(|w| w.to_lowercase())
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Share of the questions' significant terms that the source content covers (0..=100).
pub fn fanout_score(questions: &[String], content: &str) -> f64 {
    let terms: BTreeSet<String> = questions.iter().flat_map(|q| significant_terms(q)).collect();
    if terms.is_empty() {
        return 0.0;
    }
    let content_terms = significant_terms(content);
    let covered = terms.iter().filter(|t| content_terms.contains(*t)).count();
    ((covered as f64 / terms.len() as f64) * 100.0 * 100.0).round() / 100.0
}
