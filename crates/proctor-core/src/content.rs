//! Prompt construction, output clean-up, and fallback content for the
//! question/report generation service.
//!
//! The model is untrusted: every parser here tolerates free-form text and
//! the caller substitutes the fixed fallbacks when nothing usable comes back.

use serde::Serialize;

use crate::types::{VivaAnswer, Warning};

// ─── Fallbacks ────────────────────────────────────────────────────

pub const FALLBACK_PRACTICAL_QUESTION: &str =
    "Failed to generate a question. Please contact an administrator.";
pub const FALLBACK_SUMMARY_REPORT: &str =
    "Failed to generate a summary report. Please contact an administrator.";
pub const FALLBACK_ATS_RESUME: &str =
    "Failed to generate an ATS-compatible resume. Please contact an administrator.";

pub fn fallback_viva_questions() -> Vec<String> {
    [
        "What are your strengths in the technologies mentioned?",
        "How do you approach debugging complex issues?",
        "Explain your experience with these technologies.",
        "What's a challenging technical problem you've solved recently?",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Number of viva questions requested from the model.
pub const VIVA_QUESTION_COUNT: usize = 5;
/// Upper bound on questions salvaged from free-form text.
pub const MAX_VIVA_QUESTIONS: usize = 10;
/// Minimum list items before a numbered list is trusted over sentence scanning.
const MIN_LIST_QUESTIONS: usize = 5;

const CODE_EXCERPT_CHARS: usize = 500;
const SUMMARY_EXCERPT_CHARS: usize = 1000;

// ─── Clean-up ─────────────────────────────────────────────────────

/// Strip markdown emphasis/heading/quote marks, list dashes, and runs of
/// blank lines from model output.
pub fn clean_markdown(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| !matches!(c, '*' | '_' | '~' | '`' | '#' | '>'))
        .collect();

    let mut out = String::with_capacity(stripped.len());
    let mut blank_run = 0usize;
    for line in stripped.split('\n') {
        let line = line.strip_prefix("- ").unwrap_or(line);
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

// ─── Viva Questions ───────────────────────────────────────────────

/// Extract viva questions from model output.
///
/// Tried in order: a JSON array of strings (optionally fenced), a numbered
/// or dashed list with at least five items, then any sentences ending in
/// `?` (at most ten). Returns an empty list when nothing matches.
pub fn parse_viva_questions(text: &str) -> Vec<String> {
    let body = strip_code_fence(text);
    if let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(body) {
        return values
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect();
    }

    let listed: Vec<String> = text
        .lines()
        .filter_map(|line| strip_list_marker(line.trim()))
        .filter(|s| !s.is_empty())
        .collect();
    if listed.len() >= MIN_LIST_QUESTIONS {
        return listed;
    }

    split_sentences(text)
        .into_iter()
        .filter(|s| s.ends_with('?'))
        .take(MAX_VIVA_QUESTIONS)
        .collect()
}

fn strip_list_marker(line: &str) -> Option<String> {
    if let Some(rest) = line.strip_prefix('-') {
        return Some(rest.trim().to_string());
    }
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    line[digits..]
        .strip_prefix('.')
        .map(|rest| rest.trim().to_string())
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        let at_boundary = matches!(c, '?' | '.' | '!')
            && chars.peek().is_some_and(|next| next.is_whitespace());
        if at_boundary {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

// ─── Practical Question Sections ──────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionSection {
    pub title: String,
    pub body: String,
}

const SECTION_MARKERS: [&str; 7] = [
    "Problem Statement:",
    "Requirements:",
    "Example Input/Output:",
    "Expected Output:",
    "Constraints:",
    "Hints:",
    "Hint:",
];

/// Split a generated practical question into its labelled sections, in the
/// order they appear. Text before the first label is dropped.
pub fn parse_question_sections(text: &str) -> Vec<QuestionSection> {
    let mut starts: Vec<(usize, &str)> = Vec::new();
    for marker in SECTION_MARKERS {
        starts.extend(text.match_indices(marker).map(|(pos, _)| (pos, marker)));
    }
    starts.sort_by_key(|(pos, _)| *pos);
    starts.dedup_by_key(|(pos, _)| *pos);

    starts
        .iter()
        .enumerate()
        .map(|(i, (pos, marker))| {
            let end = starts.get(i + 1).map_or(text.len(), |(next, _)| *next);
            QuestionSection {
                title: marker.trim_end_matches(':').to_string(),
                body: text[pos + marker.len()..end].trim().to_string(),
            }
        })
        .filter(|s| !s.body.is_empty())
        .collect()
}

// ─── Prompts ──────────────────────────────────────────────────────

pub fn practical_question_prompt(topics: &[String], role: &str, duration_minutes: u64) -> String {
    format!(
        "Generate a practical coding problem for a {role} interview.\n\
         It should assess knowledge of: {topics}.\n\
         The candidate has {duration_minutes} minutes in total; the problem must be solvable \
         in about ten of them, test several relevant skills, and relate to a real-world scenario.\n\
         Format the answer with these sections: Problem Statement, Requirements, \
         Example Input/Output, Constraints, Hints.",
        topics = topics.join(", "),
    )
}

pub fn viva_questions_prompt(topics: &[String], role: &str) -> String {
    format!(
        "Generate {VIVA_QUESTION_COUNT} spoken interview (viva) questions for a {role} role \
         covering: {topics}.\n\
         Vary the difficulty from basic to medium, mix open-ended and specific questions, \
         and include two behavioral questions about soft skills.\n\
         Return ONLY a JSON array of strings.",
        topics = topics.join(", "),
    )
}

/// Everything the report prompt needs from a finished attempt.
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub test_title: &'a str,
    pub role: &'a str,
    pub topics: &'a [String],
    pub question: &'a str,
    pub code: &'a str,
    pub viva: &'a [VivaAnswer],
    pub warnings: &'a [Warning],
}

pub fn summary_report_prompt(input: &ReportInput<'_>) -> String {
    let viva = if input.viva.is_empty() {
        "No viva responses provided.".to_string()
    } else {
        input
            .viva
            .iter()
            .map(|v| format!("Q: {}\nA: {}", v.question, v.answer))
            .collect::<Vec<_>>()
            .join("\n\n")
    };
    let integrity = if input.warnings.is_empty() {
        "No warnings recorded.".to_string()
    } else {
        input
            .warnings
            .iter()
            .map(|w| format!("- {} at {}", w.kind, w.timestamp.format("%H:%M:%S")))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "Write an interview report for a candidate applying as {role}.\n\n\
         Test: {title}\nTopics: {topics}\n\n\
         Coding question:\n{question}\n\n\
         Candidate code:\n```\n{code}\n```\n\n\
         Viva responses:\n{viva}\n\n\
         Test integrity:\n{integrity}\n\n\
         Cover technical skills (code quality, problem solving, knowledge), behavior \
         (communication, integrity during the test), and an overall recommendation \
         (Strongly Recommend / Recommend / Neutral / Do Not Recommend).",
        role = input.role,
        title = input.test_title,
        topics = input.topics.join(", "),
        question = input.question,
        code = input.code,
    )
}

pub fn ats_resume_prompt(
    role: &str,
    test_title: &str,
    topics: &[String],
    code: &str,
    summary: &str,
) -> String {
    format!(
        "Create an ATS-compatible resume for a {role} candidate based on a technical \
         interview.\n\nTest: {test_title}\nTopics: {topics}\n\n\
         Code sample (excerpt):\n```\n{code}...\n```\n\n\
         Assessment summary (excerpt):\n{summary}...\n\n\
         Highlight the skills shown, include a tailored professional summary, and use \
         standard resume sections.",
        topics = topics.join(", "),
        code = excerpt(code, CODE_EXCERPT_CHARS),
        summary = excerpt(summary, SUMMARY_EXCERPT_CHARS),
    )
}

/// First `max` characters, never splitting a code point.
fn excerpt(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WarningKind;
    use chrono::{TimeZone, Utc};

    #[test]
    fn clean_markdown_strips_marks_and_blank_runs() {
        let raw = "## Title\n\n\n\n**Bold** and `code`\n- item one\n> quoted\n";
        assert_eq!(
            clean_markdown(raw),
            "Title\n\nBold and code\nitem one\n quoted"
        );
    }

    #[test]
    fn viva_from_json_array() {
        let text = r#"["What is ownership?", "Explain lifetimes."]"#;
        assert_eq!(
            parse_viva_questions(text),
            vec!["What is ownership?", "Explain lifetimes."]
        );
    }

    #[test]
    fn viva_from_fenced_json() {
        let text = "```json\n[\"One?\", \"Two?\"]\n```";
        assert_eq!(parse_viva_questions(text), vec!["One?", "Two?"]);
    }

    #[test]
    fn viva_from_numbered_list() {
        let text = "Here you go:\n1. A?\n2. B?\n3. C?\n- D?\n5. E?\nThanks";
        assert_eq!(parse_viva_questions(text), vec!["A?", "B?", "C?", "D?", "E?"]);
    }

    #[test]
    fn short_list_falls_back_to_question_sentences() {
        let text = "1. Intro. What is a trait? Tell me more. Why use Arc? Done!";
        assert_eq!(
            parse_viva_questions(text),
            vec!["What is a trait?", "Why use Arc?"]
        );
    }

    #[test]
    fn sentence_fallback_is_capped() {
        let text = (0..15).map(|i| format!("Q{i}?")).collect::<Vec<_>>().join(" ");
        assert_eq!(parse_viva_questions(&text).len(), MAX_VIVA_QUESTIONS);
    }

    #[test]
    fn nothing_usable_yields_empty() {
        assert!(parse_viva_questions("no questions here.").is_empty());
    }

    #[test]
    fn question_sections_in_order() {
        let text = "Intro text\nProblem Statement: Build a cache.\nRequirements: LRU eviction.\n\
                    Constraints: O(1) ops.\nHints: use a linked map.";
        let sections = parse_question_sections(text);
        let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Problem Statement", "Requirements", "Constraints", "Hints"]
        );
        assert_eq!(sections[0].body, "Build a cache.");
        assert_eq!(sections[3].body, "use a linked map.");
    }

    #[test]
    fn section_body_keeps_inner_colons() {
        let sections = parse_question_sections("Example Input/Output: input: 1, output: 2");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].body, "input: 1, output: 2");
    }

    #[test]
    fn report_prompt_lists_viva_and_warnings() {
        let viva = vec![VivaAnswer {
            question: "Why Rust?".into(),
            answer: "Safety".into(),
        }];
        let warnings = vec![Warning {
            kind: WarningKind::FocusViolation,
            timestamp: Utc.with_ymd_and_hms(2026, 1, 2, 10, 11, 12).unwrap(),
        }];
        let topics = vec!["rust".to_string(), "tokio".to_string()];
        let prompt = summary_report_prompt(&ReportInput {
            test_title: "Backend",
            role: "SRE",
            topics: &topics,
            question: "Build a cache",
            code: "fn main() {}",
            viva: &viva,
            warnings: &warnings,
        });
        assert!(prompt.contains("Q: Why Rust?\nA: Safety"));
        assert!(prompt.contains("- focus_violation at 10:11:12"));
        assert!(prompt.contains("Topics: rust, tokio"));
    }

    #[test]
    fn empty_report_sections_have_placeholders() {
        let prompt = summary_report_prompt(&ReportInput {
            test_title: "T",
            role: "R",
            topics: &[],
            question: "",
            code: "",
            viva: &[],
            warnings: &[],
        });
        assert!(prompt.contains("No viva responses provided."));
        assert!(prompt.contains("No warnings recorded."));
    }

    #[test]
    fn resume_prompt_truncates_on_char_boundary() {
        let code = "é".repeat(600);
        let prompt = ats_resume_prompt("R", "T", &[], &code, "short");
        assert!(prompt.contains(&"é".repeat(500)));
        assert!(!prompt.contains(&"é".repeat(501)));
    }
}
