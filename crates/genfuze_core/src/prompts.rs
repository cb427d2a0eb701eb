//! crates/genfuze_core/src/prompts.rs
//!
//! Provider-specific prompt templates for question and answer generation, and the
//! parser that turns a question-list completion back into individual questions.

use crate::domain::{ProviderKind, Prompt, SearchResult};

const QUESTION_SYSTEM: &str = r#"You are a content strategist. You read a piece of content and write the questions real users would ask a generative search engine about its subject.

Rules:
- One question per line.
- No numbering commentary, no preamble, no closing remarks.
- Each question must be answerable from the subject of the content.
- Prefer specific, high-intent questions over generic ones."#;

/// Gemini tends to wrap lists in prose unless told twice.
const GEMINI_QUESTION_SUFFIX: &str = "\n\nOutput ONLY the questions, one per line, with no markdown.";

/// Perplexity answers with citations by default; questions must not carry them.
const PERPLEXITY_QUESTION_SUFFIX: &str = "\n\nDo not search the web and do not add citations.";

const ANSWER_SYSTEM: &str = r#"You are a knowledgeable assistant answering a user's question.

Style:
- Answer directly in the first sentence.
- Keep it to one or two short paragraphs, or a short list when the question asks for options.
- Mention concrete names, products and numbers when you know them."#;

const WEB_ANSWER_SYSTEM: &str = r#"You are a research assistant. Answer the user's question using the numbered web search results provided.

Rules:
- Ground every claim in the results; say so when they do not cover the question.
- Cite results inline as [1], [2], ... matching their numbers.
- Keep the answer concise."#;

/// The largest number of questions a single request may ask for.
pub const MAX_QUESTIONS: usize = 20;

/// Content beyond this many characters is cut before it reaches a prompt.
pub const MAX_CONTENT_CHARS: usize = 20_000;

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn keyword_line(keywords: &[String]) -> String {
    let keywords: Vec<&str> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect();
    if keywords.is_empty() {
        String::new()
    } else {
        format!("\nTarget keywords: {}\n", keywords.join(", "))
    }
}

pub fn question_prompt(
    provider: ProviderKind,
    content: &str,
    count: usize,
    target_keywords: &[String],
) -> Prompt {
    let mut system = QUESTION_SYSTEM.to_string();
    match provider {
        ProviderKind::Gemini => system.push_str(GEMINI_QUESTION_SUFFIX),
        ProviderKind::Perplexity => system.push_str(PERPLEXITY_QUESTION_SUFFIX),
        ProviderKind::OpenAi => {}
    }

    let user = format!(
        "Write exactly {count} questions about the following content.\n{keywords}\nCONTENT:\n---\n{content}\n---",
        count = count,
        keywords = keyword_line(target_keywords),
        content = truncate_chars(content, MAX_CONTENT_CHARS),
    );

    Prompt {
        system,
        user,
        model: None,
        max_tokens: Some(100 * count.max(1) as u32),
    }
}

pub fn answer_prompt(question: &str, context: Option<&str>, target_keywords: &[String]) -> Prompt {
    let context_block = match context.map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) => format!("CONTEXT:\n---\n{}\n---\n\n", truncate_chars(c, MAX_CONTENT_CHARS)),
        None => String::new(),
    };
    Prompt {
        system: ANSWER_SYSTEM.to_string(),
        user: format!(
            "{context_block}{keywords}QUESTION:\n{question}",
            keywords = keyword_line(target_keywords),
        ),
        model: None,
        max_tokens: Some(800),
    }
}

pub fn web_answer_prompt(question: &str, results: &[SearchResult]) -> Prompt {
    let sources = if results.is_empty() {
        "(no results)".to_string()
    } else {
        results
            .iter()
            .enumerate()
            .map(|(i, r)| format!("[{}] {}\n{}\n{}", i + 1, r.title, r.link, r.snippet))
            .collect::<Vec<_>>()
            .join("\n\n")
    };
    Prompt {
        system: WEB_ANSWER_SYSTEM.to_string(),
        user: format!("SEARCH RESULTS:\n{}\n\nQUESTION:\n{}", sources, question),
        model: None,
        max_tokens: Some(800),
    }
}

/// Splits a completion into questions: one per non-empty line, with list markers,
/// numbering and wrapping quotes removed. Lines that are clearly preamble (ending with
/// a colon) are skipped.
pub fn parse_questions(text: &str, limit: usize) -> Vec<String> {
    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| c == '-' || c == '*' || c == '•' || c == '#')
                .trim_start()
        })
        .map(|line| {
            // "1." / "1)" / "Q1:" numbering
            let without_q = line
                .strip_prefix('Q')
                .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
                .unwrap_or(line);
            let digits = without_q.chars().take_while(|c| c.is_ascii_digit()).count();
            if digits > 0 {
                let rest = &without_q[digits..];
                if let Some(rest) = rest.strip_prefix(['.', ')', ':']) {
                    return rest.trim();
                }
            }
            line
        })
        .map(|line| line.trim_matches(|c: char| c == '"' || c == '*').trim())
        .filter(|line| !line.is_empty() && !line.ends_with(':'))
        .map(str::to_string)
        .take(limit)
        .collect()
}
