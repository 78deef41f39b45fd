//! Scoping form schema, builder operations and answer validation.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ScopingError;

static SERVICE_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]+(?:_[A-Z0-9]+)*$").expect("valid regex"));

/// How a question is answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    Text,
    LongText,
    Number,
    YesNo,
    SingleChoice { options: Vec<String> },
    MultiChoice { options: Vec<String> },
}

impl QuestionKind {
    fn options(&self) -> Option<&[String]> {
        match self {
            Self::SingleChoice { options } | Self::MultiChoice { options } => Some(options),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub prompt: String,
    pub kind: QuestionKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
}

/// A per-service questionnaire describing a client's requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopingForm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub service_type: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl ScopingForm {
    pub fn new(service_type: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: None,
            service_type: service_type.into(),
            title: title.into(),
            description: None,
            questions: Vec::new(),
        }
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn add_question(&mut self, question: Question) -> Result<(), ScopingError> {
        if self.question(&question.id).is_some() {
            return Err(ScopingError::DuplicateQuestion(question.id));
        }
        self.questions.push(question);
        Ok(())
    }

    pub fn remove_question(&mut self, id: &str) -> Result<Question, ScopingError> {
        let index = self.position(id)?;
        Ok(self.questions.remove(index))
    }

    /// Replace a question in place, keeping its position.
    pub fn update_question(&mut self, question: Question) -> Result<(), ScopingError> {
        let index = self.position(&question.id)?;
        self.questions[index] = question;
        Ok(())
    }

    pub fn move_question(&mut self, from: usize, to: usize) -> Result<(), ScopingError> {
        let len = self.questions.len();
        for index in [from, to] {
            if index >= len {
                return Err(ScopingError::OutOfRange { index, len });
            }
        }
        let question = self.questions.remove(from);
        self.questions.insert(to, question);
        Ok(())
    }

    /// Apply a batch of question edits in order. Stops at the first failure,
    /// leaving earlier edits applied; callers work on a copy.
    pub fn apply_edits(&mut self, edits: Vec<QuestionEdit>) -> Result<(), ScopingError> {
        for edit in edits {
            match edit {
                QuestionEdit::Add { question } => self.add_question(question)?,
                QuestionEdit::Update { question } => self.update_question(question)?,
                QuestionEdit::Remove { question_id } => {
                    self.remove_question(&question_id)?;
                }
                QuestionEdit::Move { from, to } => self.move_question(from, to)?,
            }
        }
        Ok(())
    }

    fn position(&self, id: &str) -> Result<usize, ScopingError> {
        self.questions
            .iter()
            .position(|q| q.id == id)
            .ok_or_else(|| ScopingError::QuestionNotFound(id.to_string()))
    }

    /// Check the form itself is well-formed before it is saved.
    pub fn validate(&self) -> Result<(), ScopingError> {
        if self.title.trim().is_empty() {
            return Err(ScopingError::InvalidForm("title is empty".to_string()));
        }
        if !SERVICE_TYPE.is_match(&self.service_type) {
            return Err(ScopingError::InvalidForm(format!(
                "service type {:?} must be upper snake case",
                self.service_type
            )));
        }
        let mut seen = HashSet::new();
        for q in &self.questions {
            if q.id.trim().is_empty() {
                return Err(ScopingError::InvalidForm("question id is empty".to_string()));
            }
            if !seen.insert(q.id.as_str()) {
                return Err(ScopingError::DuplicateQuestion(q.id.clone()));
            }
            if q.prompt.trim().is_empty() {
                return Err(ScopingError::InvalidForm(format!(
                    "question {} has no prompt",
                    q.id
                )));
            }
            if q.kind.options().is_some_and(|o| o.is_empty()) {
                return Err(ScopingError::InvalidForm(format!(
                    "question {} has no options",
                    q.id
                )));
            }
        }
        Ok(())
    }

    /// Check submitted answers against the form.
    pub fn validate_answers(&self, answers: &ScopingAnswers) -> Result<(), ScopingError> {
        if answers.service_type != self.service_type {
            return Err(ScopingError::ServiceMismatch {
                expected: self.service_type.clone(),
                found: answers.service_type.clone(),
            });
        }

        let mut issues = Vec::new();

        for answer in &answers.answers {
            let Some(question) = self.question(&answer.question_id) else {
                issues.push(AnswerIssue::UnknownQuestion {
                    question_id: answer.question_id.clone(),
                });
                continue;
            };
            if let Some(issue) = check_value(question, &answer.value) {
                issues.push(issue);
            }
        }

        for question in self.questions.iter().filter(|q| q.required) {
            let answered = answers
                .answer(&question.id)
                .is_some_and(|a| !is_blank(&a.value));
            if !answered {
                issues.push(AnswerIssue::MissingRequired {
                    question_id: question.id.clone(),
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ScopingError::InvalidAnswers(issues))
        }
    }
}

fn is_blank(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.trim().is_empty(),
        serde_json::Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

fn check_value(question: &Question, value: &serde_json::Value) -> Option<AnswerIssue> {
    use serde_json::Value;

    if is_blank(value) {
        return None;
    }

    let mismatch = |expected: &str| {
        Some(AnswerIssue::WrongType {
            question_id: question.id.clone(),
            expected: expected.to_string(),
        })
    };
    let unknown_option = |option: &str| {
        Some(AnswerIssue::UnknownOption {
            question_id: question.id.clone(),
            option: option.to_string(),
        })
    };

    match (&question.kind, value) {
        (QuestionKind::Text | QuestionKind::LongText, Value::String(_)) => None,
        (QuestionKind::Text | QuestionKind::LongText, _) => mismatch("string"),
        (QuestionKind::Number, Value::Number(_)) => None,
        (QuestionKind::Number, _) => mismatch("number"),
        (QuestionKind::YesNo, Value::Bool(_)) => None,
        (QuestionKind::YesNo, _) => mismatch("boolean"),
        (QuestionKind::SingleChoice { options }, Value::String(s)) => {
            if options.contains(s) {
                None
            } else {
                unknown_option(s)
            }
        }
        (QuestionKind::SingleChoice { .. }, _) => mismatch("one option"),
        (QuestionKind::MultiChoice { options }, Value::Array(items)) => {
            for item in items {
                match item.as_str() {
                    Some(s) if options.iter().any(|o| o == s) => {}
                    Some(s) => return unknown_option(s),
                    None => return mismatch("list of options"),
                }
            }
            None
        }
        (QuestionKind::MultiChoice { .. }, _) => mismatch("list of options"),
    }
}

/// One change to a form's question list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum QuestionEdit {
    Add { question: Question },
    Update { question: Question },
    Remove { question_id: String },
    Move { from: usize, to: usize },
}

/// A single answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// A client's answers to the scoping form of one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopingAnswers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub client_id: String,
    pub service_type: String,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl ScopingAnswers {
    pub fn answer(&self, question_id: &str) -> Option<&Answer> {
        self.answers.iter().find(|a| a.question_id == question_id)
    }
}

/// Why an answer set does not satisfy a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum AnswerIssue {
    MissingRequired { question_id: String },
    UnknownQuestion { question_id: String },
    WrongType { question_id: String, expected: String },
    UnknownOption { question_id: String, option: String },
}
