use serde::{Deserialize, Serialize};

/// Which input path produced the text being enriched. Voice input may be
/// skipped by the provider; typed input never is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Voice,
    Typed,
}

/// Structured enrichment payload sent to the client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub questions: Vec<String>,
    pub answers: Vec<String>,
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub skip: bool,
}

impl EnrichmentResult {
    pub fn skipped() -> Self {
        Self {
            skip: true,
            ..Self::default()
        }
    }

    /// Failure placeholder: empty sections, explanation under suggestions
    pub fn failure(message: String) -> Self {
        Self {
            suggestions: vec![message],
            ..Self::default()
        }
    }
}

/// Outcome of parsing a raw completion, decided once
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    /// The provider judged that no response is warranted (voice input only)
    Skip,
    Content {
        questions: Vec<String>,
        answers: Vec<String>,
        suggestions: Vec<String>,
    },
}

impl From<Parsed> for EnrichmentResult {
    fn from(parsed: Parsed) -> Self {
        match parsed {
            Parsed::Skip => EnrichmentResult::skipped(),
            Parsed::Content {
                questions,
                answers,
                suggestions,
            } => EnrichmentResult {
                questions,
                answers,
                suggestions,
                skip: false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Questions,
    Answers,
    Suggestions,
}

/// Parse a raw completion into sections
///
/// Lines are scanned in order: a header line (one containing "question",
/// "answer" or "suggestion") opens a section, bulleted lines become items of
/// the open section, unbulleted lines extend its last item, and text before
/// any header is collected as a direct answer used when no Answers section
/// appears.
pub fn parse_response(content: &str, kind: InputKind) -> Parsed {
    if kind == InputKind::Voice {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(content) {
            if value.get("skip").and_then(|skip| skip.as_bool()) == Some(true) {
                return Parsed::Skip;
            }
        }
    }

    let mut questions: Vec<String> = Vec::new();
    let mut answers: Vec<String> = Vec::new();
    let mut suggestions: Vec<String> = Vec::new();

    let mut current: Option<Section> = None;
    let mut collecting_direct = false;
    let mut direct: Vec<String> = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        // Strip emphasis markup before interpreting the line.
        let clean = trimmed.replace("**", "").replace('*', "").replace('_', "");
        let lower = clean.to_lowercase();

        if lower.contains("question") {
            current = Some(Section::Questions);
            collecting_direct = false;
        } else if lower.contains("answer") {
            current = Some(Section::Answers);
            collecting_direct = false;
        } else if lower.contains("suggestion") {
            current = Some(Section::Suggestions);
            collecting_direct = false;
        } else if current.is_some() && (clean.starts_with('-') || clean.starts_with('•')) {
            let item = clean
                .strip_prefix('-')
                .or_else(|| clean.strip_prefix('•'))
                .unwrap_or(&clean)
                .trim();
            if !item.is_empty() {
                if let Some(section) = current {
                    section_list(section, &mut questions, &mut answers, &mut suggestions)
                        .push(item.to_string());
                }
            }
        } else if current.is_none() && !collecting_direct {
            // Text before any header: start collecting a direct answer.
            collecting_direct = true;
            direct.push(clean);
        } else if collecting_direct {
            direct.push(clean);
        } else if let Some(section) = current {
            // Continuation of the section's last multi-line item.
            let list = section_list(section, &mut questions, &mut answers, &mut suggestions);
            match list.last_mut() {
                Some(last) => {
                    last.push(' ');
                    last.push_str(&clean);
                }
                None => list.push(clean),
            }
        }
    }

    if !direct.is_empty() && answers.is_empty() {
        answers.push(direct.join(" ").trim().to_string());
    }

    Parsed::Content {
        questions: clean_items(questions),
        answers: clean_items(answers),
        suggestions: clean_items(suggestions),
    }
}

fn section_list<'a>(
    section: Section,
    questions: &'a mut Vec<String>,
    answers: &'a mut Vec<String>,
    suggestions: &'a mut Vec<String>,
) -> &'a mut Vec<String> {
    match section {
        Section::Questions => questions,
        Section::Answers => answers,
        Section::Suggestions => suggestions,
    }
}

fn clean_items(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
