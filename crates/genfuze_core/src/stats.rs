//! Aggregations behind the statistics, cost-breakdown and benchmark dashboards.

use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{QAData, Session, SessionStatistics, SessionType};

/// Recomputes a session's statistics from its QA data.
pub fn compute_statistics(qa_data: &[QAData]) -> SessionStatistics {
    let accuracies: Vec<f64> = qa_data.iter().filter_map(|qa| qa.accuracy).collect();
    let avg_accuracy = if accuracies.is_empty() {
        0.0
    } else {
        accuracies.iter().sum::<f64>() / accuracies.len() as f64
    };

    SessionStatistics {
        total_cost: qa_data.iter().map(|qa| qa.cost).sum(),
        avg_accuracy,
        total_input_tokens: qa_data.iter().map(|qa| qa.input_tokens as u64).sum(),
        total_output_tokens: qa_data.iter().map(|qa| qa.output_tokens as u64).sum(),
        question_count: qa_data.len(),
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, ToSchema)]
pub struct CostBucket {
    pub sessions: usize,
    pub total_cost: f64,
    pub total_tokens: u64,
}

/// Per-user aggregate shown on the main dashboard.
#[derive(Debug, Clone, Default, Serialize, PartialEq, ToSchema)]
pub struct DashboardStats {
    pub total_sessions: usize,
    pub question_sessions: usize,
    pub answer_sessions: usize,
    pub total_questions: usize,
    pub total_cost: f64,
    pub avg_accuracy: f64,
    pub total_tokens: u64,
    pub cost_by_provider: BTreeMap<String, CostBucket>,
    pub cost_by_model: BTreeMap<String, CostBucket>,
}

pub fn dashboard_stats(sessions: &[Session]) -> DashboardStats {
    let mut stats = DashboardStats::default();
    let mut accuracy_sum = 0.0;
    let mut accuracy_sessions = 0usize;

    for session in sessions {
        let s = &session.statistics;
        let tokens = s.total_input_tokens + s.total_output_tokens;

        stats.total_sessions += 1;
        match session.session_type {
            SessionType::Question => stats.question_sessions += 1,
            SessionType::Answer => stats.answer_sessions += 1,
        }
        stats.total_questions += s.question_count;
        stats.total_cost += s.total_cost;
        stats.total_tokens += tokens;

        if s.question_count > 0 {
            accuracy_sum += s.avg_accuracy;
            accuracy_sessions += 1;
        }

        for (map, key) in [
            (&mut stats.cost_by_provider, &session.provider),
            (&mut stats.cost_by_model, &session.model),
        ] {
            let bucket = map.entry(key.clone()).or_default();
            bucket.sessions += 1;
            bucket.total_cost += s.total_cost;
            bucket.total_tokens += tokens;
        }
    }

    if accuracy_sessions > 0 {
        stats.avg_accuracy = accuracy_sum / accuracy_sessions as f64;
    }
    stats
}

/// Mention statistics for one brand or competitor across a session's answers.
#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
pub struct BenchmarkEntry {
    pub name: String,
    pub is_brand: bool,
    pub answers_mentioning: usize,
    pub total_mentions: usize,
    /// Share of all mentions (0..=100) among the compared names.
    pub mention_share: f64,
    /// Mean character offset (as a 0..=1 fraction of the answer length) of the first
    /// mention; `None` when never mentioned. Lower means mentioned earlier.
    pub avg_first_position: Option<f64>,
}

/// Byte offsets of whole-word occurrences of `needle` in the lowercased `hay`.
fn word_occurrences(hay: &str, needle: &str) -> Vec<usize> {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    hay.match_indices(needle.as_str())
        .filter(|(start, _)| {
            let before = hay[..*start].chars().next_back();
            let after = hay[start + needle.len()..].chars().next();
            !before.is_some_and(|c| c.is_alphanumeric()) && !after.is_some_and(|c| c.is_alphanumeric())
        })
        .map(|(start, _)| start)
        .collect()
}

pub fn benchmark(answers: &[String], brand: Option<&str>, competitors: &[String]) -> Vec<BenchmarkEntry> {
    let names: Vec<(String, bool)> = brand
        .filter(|b| !b.trim().is_empty())
        .map(|b| (b.trim().to_string(), true))
        .into_iter()
        .chain(
            competitors
                .iter()
                .filter(|c| !c.trim().is_empty())
                .map(|c| (c.trim().to_string(), false)),
        )
        .collect();

    let lowered: Vec<String> = answers.iter().map(|a| a.to_lowercase()).collect();

    let mut entries: Vec<BenchmarkEntry> = names
        .into_iter()
        .map(|(name, is_brand)| {
            let mut answers_mentioning = 0;
            let mut total_mentions = 0;
            let mut positions = Vec::new();
            for hay in &lowered {
                let hits = word_occurrences(hay, &name);
                if let Some(first) = hits.first() {
                    answers_mentioning += 1;
                    positions.push(*first as f64 / hay.len().max(1) as f64);
                }
                total_mentions += hits.len();
            }
            let avg_first_position = if positions.is_empty() {
                None
            } else {
                Some(positions.iter().sum::<f64>() / positions.len() as f64)
            };
            BenchmarkEntry {
                name,
                is_brand,
                answers_mentioning,
                total_mentions,
                mention_share: 0.0,
                avg_first_position,
            }
        })
        .collect();

    let all_mentions: usize = entries.iter().map(|e| e.total_mentions).sum();
    if all_mentions > 0 {
        for entry in &mut entries {
            entry.mention_share = entry.total_mentions as f64 / all_mentions as f64 * 100.0;
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn qa(cost: f64, accuracy: Option<f64>) -> QAData {
        QAData {
            question: "q".into(),
            answer: "a".into(),
            input_tokens: 100,
            output_tokens: 50,
            cost,
            accuracy,
            ..Default::default()
        }
    }

    fn session(provider: &str, model: &str, session_type: SessionType, qa_data: Vec<QAData>) -> Session {
        Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            session_type,
            name: "s".into(),
            provider: provider.into(),
            model: model.into(),
            source_urls: vec![],
            blog_content: None,
            statistics: compute_statistics(&qa_data),
            qa_data,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn statistics_ignore_missing_accuracy() {
        let stats = compute_statistics(&[qa(0.5, Some(80.0)), qa(0.25, None), qa(0.25, Some(60.0))]);
        assert!((stats.total_cost - 1.0).abs() < 1e-12);
        assert!((stats.avg_accuracy - 70.0).abs() < 1e-12);
        assert_eq!(stats.total_input_tokens, 300);
        assert_eq!(stats.total_output_tokens, 150);
        assert_eq!(stats.question_count, 3);
        assert_eq!(compute_statistics(&[]).avg_accuracy, 0.0);
    }

    #[test]
    fn dashboard_groups_costs() {
        let sessions = vec![
            session("openai", "gpt-4o", SessionType::Answer, vec![qa(1.0, Some(90.0))]),
            session("openai", "gpt-4o-mini", SessionType::Question, vec![qa(0.5, Some(70.0))]),
            session("gemini", "gemini-1.5-flash", SessionType::Answer, vec![]),
        ];
        let stats = dashboard_stats(&sessions);
        assert_eq!(stats.total_sessions, 3);
        assert_eq!(stats.answer_sessions, 2);
        assert_eq!(stats.question_sessions, 1);
        assert!((stats.total_cost - 1.5).abs() < 1e-12);
        assert!((stats.avg_accuracy - 80.0).abs() < 1e-12);
        assert_eq!(stats.cost_by_provider["openai"].sessions, 2);
        assert_eq!(stats.cost_by_model["gemini-1.5-flash"].total_cost, 0.0);
        assert_eq!(stats.total_tokens, 300);
    }

    #[test]
    fn benchmark_counts_whole_words_only() {
        let answers = vec![
            "Acme leads the market, ahead of Globex.".to_string(),
            "Globex and globex again; Acmeville is unrelated.".to_string(),
        ];
        let entries = benchmark(&answers, Some("Acme"), &["Globex".to_string(), "Initech".to_string()]);
        assert_eq!(entries.len(), 3);

        let acme = &entries[0];
        assert!(acme.is_brand);
        assert_eq!(acme.total_mentions, 1);
        assert_eq!(acme.answers_mentioning, 1);
        assert_eq!(acme.avg_first_position, Some(0.0));

        let globex = &entries[1];
        assert_eq!(globex.total_mentions, 3);
        assert_eq!(globex.answers_mentioning, 2);
        assert!((globex.mention_share - 75.0).abs() < 1e-9);

        assert_eq!(entries[2].total_mentions, 0);
        assert!(entries[2].avg_first_position.is_none());
    }

    #[test]
    fn first_position_stays_a_fraction_when_lowercasing_grows_text() {
        // U+0130 is two bytes but lowercases to three.
        let answers = vec!["\u{130}\u{130}\u{130}\u{130}\u{130}\u{130} Acme".to_string()];
        let entries = benchmark(&answers, Some("Acme"), &[]);
        let position = entries[0].avg_first_position.unwrap();
        assert!(position <= 1.0);
        assert!((position - 19.0 / 23.0).abs() < 1e-9);
    }
}
