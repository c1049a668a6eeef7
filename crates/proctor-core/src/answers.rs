//! Viva questions with their parallel transcript slots.

use crate::error::{ProctorError, Result};
use crate::types::VivaAnswer;

/// Questions and transcripts, always the same length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VivaSheet {
    questions: Vec<String>,
    transcripts: Vec<String>,
}

impl VivaSheet {
    pub fn new(questions: Vec<String>) -> Self {
        let transcripts = vec![String::new(); questions.len()];
        Self {
            questions,
            transcripts,
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn question(&self, index: usize) -> Option<&str> {
        self.questions.get(index).map(String::as_str)
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn transcripts(&self) -> &[String] {
        &self.transcripts
    }

    /// Overwrite one slot. Slots may be filled in any order.
    pub fn record(&mut self, index: usize, transcript: impl Into<String>) -> Result<()> {
        let len = self.transcripts.len();
        let slot = self.transcripts.get_mut(index).ok_or_else(|| {
            ProctorError::InvalidInput(format!("question index {index} out of range (0..{len})"))
        })?;
        *slot = transcript.into();
        Ok(())
    }

    pub fn answered(&self) -> usize {
        self.transcripts.iter().filter(|t| !t.is_empty()).count()
    }

    pub fn paired(&self) -> Vec<VivaAnswer> {
        self.questions
            .iter()
            .zip(&self.transcripts)
            .map(|(question, answer)| VivaAnswer {
                question: question.clone(),
                answer: answer.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn five() -> VivaSheet {
        VivaSheet::new((1..=5).map(|i| format!("Question {i}?")).collect())
    }

    #[test]
    fn transcripts_start_empty_and_parallel() {
        let sheet = five();
        assert_eq!(sheet.len(), 5);
        assert_eq!(sheet.transcripts().len(), 5);
        assert!(sheet.transcripts().iter().all(String::is_empty));
    }

    #[test]
    fn recording_one_slot_leaves_others_untouched() {
        let mut sheet = five();
        sheet.record(2, "ownership moves values").expect("record");
        assert_eq!(sheet.transcripts()[2], "ownership moves values");
        for i in [0, 1, 3, 4] {
            assert_eq!(sheet.transcripts()[i], "");
        }
        assert_eq!(sheet.transcripts().len(), sheet.questions().len());
        assert_eq!(sheet.answered(), 1);
    }

    #[test]
    fn recording_overwrites_previous_answer() {
        let mut sheet = five();
        sheet.record(4, "first").expect("record");
        sheet.record(0, "out of order").expect("record");
        sheet.record(4, "second").expect("record");
        assert_eq!(sheet.transcripts()[4], "second");
        assert_eq!(sheet.answered(), 2);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut sheet = five();
        assert!(matches!(
            sheet.record(5, "nope"),
            Err(ProctorError::InvalidInput(_))
        ));
        assert_eq!(sheet.answered(), 0);
    }

    #[test]
    fn paired_matches_questions_to_answers() {
        let mut sheet = VivaSheet::new(vec!["A?".into(), "B?".into()]);
        sheet.record(1, "b").expect("record");
        let pairs = sheet.paired();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].question, "A?");
        assert_eq!(pairs[0].answer, "");
        assert_eq!(pairs[1].answer, "b");
    }
}
