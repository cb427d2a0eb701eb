//! CSV export of saved sessions, one row per QA pair.

use crate::domain::Session;

/// Header row of the exported file.
pub const CSV_HEADER: [&str; 12] = [
    "session_id",
    "session_name",
    "session_type",
    "provider",
    "model",
    "question",
    "answer",
    "input_tokens",
    "output_tokens",
    "cost",
    "accuracy",
    "created_at",
];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV buffer error: {0}")]
    Buffer(String),
}

/// Renders sessions as RFC 4180 CSV. Quotes, commas and line breaks inside fields are
/// escaped by the writer.
pub fn sessions_to_csv(sessions: &[Session]) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for session in sessions {
        let id = session.id.to_string();
        let created_at = session.created_at.to_rfc3339();
        for qa in &session.qa_data {
            let input_tokens = qa.input_tokens.to_string();
            let output_tokens = qa.output_tokens.to_string();
            let cost = format!("{:.6}", qa.cost);
            let accuracy = qa.accuracy.map(|a| format!("{:.2}", a)).unwrap_or_default();
            writer.write_record([
                id.as_str(),
                session.name.as_str(),
                session.session_type.as_str(),
                session.provider.as_str(),
                session.model.as_str(),
                qa.question.as_str(),
                qa.answer.as_str(),
                input_tokens.as_str(),
                output_tokens.as_str(),
                cost.as_str(),
                accuracy.as_str(),
                created_at.as_str(),
            ])?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Buffer(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ExportError::Buffer(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{QAData, SessionStatistics, SessionType};
    use chrono::Utc;
    use uuid::Uuid;

    fn session_with(question: &str, answer: &str) -> Session {
        Session {
            id: Uuid::nil(),
            user_id: Uuid::new_v4(),
            session_type: SessionType::Answer,
            name: "Launch, \"v2\"".into(),
            provider: "openai".into(),
            model: "gpt-4o".into(),
            source_urls: vec![],
            blog_content: None,
            qa_data: vec![QAData {
                question: question.into(),
                answer: answer.into(),
                input_tokens: 12,
                output_tokens: 34,
                cost: 0.5,
                accuracy: Some(88.0),
                ..Default::default()
            }],
            statistics: SessionStatistics::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn header_only_when_empty() {
        let csv = sessions_to_csv(&[]).unwrap();
        assert_eq!(csv.trim_end(), CSV_HEADER.join(","));
    }

    #[test]
    fn escapes_quotes_commas_and_newlines() {
        let csv = sessions_to_csv(&[session_with("Is it \"fast\", really?", "Yes.\nVery.")]).unwrap();
        assert!(csv.contains("\"Launch, \"\"v2\"\"\""), "{csv}");
        assert!(csv.contains("\"Is it \"\"fast\"\", really?\""), "{csv}");
        assert!(csv.contains("\"Yes.\nVery.\""), "{csv}");
        assert!(csv.contains(",12,34,0.500000,88.00,"), "{csv}");

        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[5], "Is it \"fast\", really?");
        assert_eq!(&record[6], "Yes.\nVery.");
    }
}
