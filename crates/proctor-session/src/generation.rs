//! Generated content with a fixed-fallback policy: a model failure never
//! blocks the session.

use std::sync::Arc;

use proctor_core::content::{
    self, FALLBACK_ATS_RESUME, FALLBACK_PRACTICAL_QUESTION, FALLBACK_SUMMARY_REPORT, ReportInput,
    fallback_viva_questions,
};

use crate::ports::TextModel;

#[derive(Clone)]
pub struct ContentService {
    model: Arc<dyn TextModel>,
}

impl ContentService {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }

    /// Cleaned model output, or `None` on error or blank output.
    async fn generate(&self, what: &'static str, prompt: &str) -> Option<String> {
        match self.model.generate(prompt).await {
            Ok(text) => {
                let cleaned = content::clean_markdown(&text);
                if cleaned.is_empty() {
                    tracing::warn!(what, "model returned empty output, using fallback");
                    None
                } else {
                    Some(cleaned)
                }
            }
            Err(err) => {
                tracing::warn!(what, error = %err, "generation failed, using fallback");
                None
            }
        }
    }

    pub async fn practical_question(
        &self,
        topics: &[String],
        role: &str,
        duration_minutes: u64,
    ) -> String {
        let prompt = content::practical_question_prompt(topics, role, duration_minutes);
        self.generate("practical_question", &prompt)
            .await
            .unwrap_or_else(|| FALLBACK_PRACTICAL_QUESTION.to_string())
    }

    pub async fn viva_questions(&self, topics: &[String], role: &str) -> Vec<String> {
        let prompt = content::viva_questions_prompt(topics, role);
        // Parse the raw text: JSON arrays do not survive markdown cleanup.
        let raw = match self.model.generate(&prompt).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(what = "viva_questions", error = %err, "generation failed, using fallback");
                return fallback_viva_questions();
            }
        };
        let questions = content::parse_viva_questions(&raw);
        if questions.is_empty() {
            tracing::warn!(what = "viva_questions", "unparseable output, using fallback");
            return fallback_viva_questions();
        }
        questions
    }

    pub async fn summary_report(&self, input: &ReportInput<'_>) -> String {
        let prompt = content::summary_report_prompt(input);
        self.generate("summary_report", &prompt)
            .await
            .unwrap_or_else(|| FALLBACK_SUMMARY_REPORT.to_string())
    }

    pub async fn ats_resume(
        &self,
        role: &str,
        test_title: &str,
        topics: &[String],
        code: &str,
        summary: &str,
    ) -> String {
        let prompt = content::ats_resume_prompt(role, test_title, topics, code, summary);
        self.generate("ats_resume", &prompt)
            .await
            .unwrap_or_else(|| FALLBACK_ATS_RESUME.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::CannedModel;

    fn topics() -> Vec<String> {
        vec!["rust".into(), "async".into()]
    }

    #[tokio::test]
    async fn failures_fall_back() {
        let model = Arc::new(CannedModel::default());
        model.set_failing(true);
        let service = ContentService::new(model);
        assert_eq!(
            service.practical_question(&topics(), "backend", 45).await,
            FALLBACK_PRACTICAL_QUESTION
        );
        assert_eq!(service.viva_questions(&topics(), "backend").await, fallback_viva_questions());
        assert_eq!(
            service.ats_resume("backend", "Rust", &topics(), "fn main(){}", "ok").await,
            FALLBACK_ATS_RESUME
        );
    }

    #[tokio::test]
    async fn viva_questions_parse_json_array() {
        let model = Arc::new(CannedModel::default());
        model.set_viva_reply(r#"["What is ownership?","Explain Send.","Why Pin?","What is a trait object?","Explain lifetimes."]"#);
        let service = ContentService::new(model);
        let questions = service.viva_questions(&topics(), "backend").await;
        assert_eq!(questions.len(), 5);
        assert_eq!(questions[0], "What is ownership?");
    }

    #[tokio::test]
    async fn markdown_is_cleaned() {
        let model = Arc::new(CannedModel::default());
        model.set_question_reply("## Problem Statement\n**Reverse** a list.");
        let service = ContentService::new(model);
        let question = service.practical_question(&topics(), "backend", 30).await;
        assert_eq!(question, "Problem Statement\nReverse a list.");
    }
}
