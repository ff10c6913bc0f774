//! Instructor authoring: the quiz draft state machine and course drafts.
//!
//! A [`QuizDraft`] is never edited in place. Every transition builds a new
//! draft from the previous one, and [`QuizAuthoring`] keeps the drafts it
//! replaced so an edit can be undone.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    models::{Category, Question, Quiz, QuizTarget},
    store::{QuizSink, StoreError},
};

/// Option slots a new question starts with.
pub const DEFAULT_OPTION_COUNT: usize = 3;

#[derive(Error, Debug)]
pub enum AuthoringError {
    #[error("question {0} does not exist")]
    NoSuchQuestion(usize),
    #[error("question {question} has no option {option}")]
    NoSuchOption { question: usize, option: usize },
    #[error("{text:?} is not an option of question {question}")]
    NotAnOption { question: usize, text: String },
    #[error("a submission is in flight")]
    Submitting,
    #[error("submit failed: {0}")]
    Store(#[from] StoreError),
}

/// Something that keeps a draft from being a complete quiz.
#[derive(Error, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum DraftProblem {
    #[error("quiz title is empty")]
    MissingTitle,
    #[error("question {question} has no text")]
    MissingQuestionText { question: usize },
    #[error("option {option} of question {question} is empty")]
    MissingOption { question: usize, option: usize },
    #[error("question {question} has no correct answer")]
    MissingCorrectAnswer { question: usize },
    #[error("correct answer of question {question} matches none of its options")]
    StaleCorrectAnswer { question: usize },
}

/// What the correct-answer marker is bound to when an option is edited.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CorrectAnswerTracking {
    /// The marker is a copy of the option text. Editing the option leaves the
    /// marker pointing at the old text.
    #[default]
    Value,
    /// The marker follows the option slot that was marked.
    Index,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    #[serde(rename = "question", default)]
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: Option<String>,
    /// Slot the answer was marked on. Only consulted by index tracking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_option: Option<usize>,
}

impl Default for QuestionDraft {
    fn default() -> Self {
        Self {
            text: String::new(),
            options: vec![String::new(); DEFAULT_OPTION_COUNT],
            correct_answer: None,
            correct_option: None,
        }
    }
}

impl QuestionDraft {
    fn problems(&self, question: usize, out: &mut Vec<DraftProblem>) {
        if self.text.is_empty() {
            out.push(DraftProblem::MissingQuestionText { question });
        }
        for (option, text) in self.options.iter().enumerate() {
            if text.is_empty() {
                out.push(DraftProblem::MissingOption { question, option });
            }
        }
        match &self.correct_answer {
            None => out.push(DraftProblem::MissingCorrectAnswer { question }),
            Some(answer) if !self.options.contains(answer) => {
                out.push(DraftProblem::StaleCorrectAnswer { question })
            }
            Some(_) => {}
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct QuizDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub questions: Vec<QuestionDraft>,
}

impl Default for QuizDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl QuizDraft {
    /// A blank draft: no title and one blank question.
    pub fn new() -> Self {
        Self {
            title: String::new(),
            questions: vec![QuestionDraft::default()],
        }
    }

    fn question(&self, index: usize) -> Result<&QuestionDraft, AuthoringError> {
        self.questions
            .get(index)
            .ok_or(AuthoringError::NoSuchQuestion(index))
    }

    fn replace_question(&self, index: usize, question: QuestionDraft) -> Self {
        let mut questions = self.questions.clone();
        questions[index] = question;
        Self {
            title: self.title.clone(),
            questions,
        }
    }

    pub fn with_title(&self, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            questions: self.questions.clone(),
        }
    }

    pub fn with_question_text(&self, index: usize, text: impl Into<String>) -> Result<Self, AuthoringError> {
        let question = QuestionDraft {
            text: text.into(),
            ..self.question(index)?.clone()
        };
        Ok(self.replace_question(index, question))
    }

    pub fn with_option_text(
        &self,
        index: usize,
        option: usize,
        text: impl Into<String>,
        tracking: CorrectAnswerTracking,
    ) -> Result<Self, AuthoringError> {
        let mut question = self.question(index)?.clone();
        let text = text.into();
        let slot = question
            .options
            .get_mut(option)
            .ok_or(AuthoringError::NoSuchOption { question: index, option })?;
        let previous = std::mem::replace(slot, text.clone());

        // drafts received over the API carry no slot, fall back to the text
        let marked = match question.correct_option {
            Some(slot) => slot == option,
            None => question.correct_answer.as_deref() == Some(previous.as_str()),
        };
        if marked && tracking == CorrectAnswerTracking::Index {
            question.correct_answer = Some(text);
        }
        Ok(self.replace_question(index, question))
    }

    /// Marks the option with this exact text as the answer, replacing any
    /// earlier choice. With duplicate texts the first slot is marked.
    pub fn with_correct_answer(&self, index: usize, option_text: &str) -> Result<Self, AuthoringError> {
        let slot = self
            .question(index)?
            .options
            .iter()
            .position(|o| o == option_text)
            .ok_or_else(|| AuthoringError::NotAnOption {
                question: index,
                text: option_text.to_string(),
            })?;
        self.with_correct_option(index, slot)
    }

    /// Marks the option in slot `option` as the answer.
    pub fn with_correct_option(&self, index: usize, option: usize) -> Result<Self, AuthoringError> {
        let question = self.question(index)?;
        let text = question
            .options
            .get(option)
            .ok_or(AuthoringError::NoSuchOption { question: index, option })?;
        let question = QuestionDraft {
            correct_answer: Some(text.clone()),
            correct_option: Some(option),
            ..question.clone()
        };
        Ok(self.replace_question(index, question))
    }

    pub fn with_question_added(&self) -> Self {
        let mut questions = self.questions.clone();
        questions.push(QuestionDraft::default());
        Self {
            title: self.title.clone(),
            questions,
        }
    }

    pub fn with_option_added(&self, index: usize) -> Result<Self, AuthoringError> {
        let mut question = self.question(index)?.clone();
        question.options.push(String::new());
        Ok(self.replace_question(index, question))
    }

    pub fn problems(&self) -> Vec<DraftProblem> {
        let mut out = Vec::new();
        if self.title.is_empty() {
            out.push(DraftProblem::MissingTitle);
        }
        for (i, q) in self.questions.iter().enumerate() {
            q.problems(i, &mut out);
        }
        out
    }

    pub fn is_valid(&self) -> bool {
        self.problems().is_empty()
    }

    /// Questions as they will be stored. An unset answer becomes "".
    pub fn to_questions(&self) -> Vec<Question> {
        self.questions
            .iter()
            .map(|q| Question {
                text: q.text.clone(),
                options: q.options.clone(),
                correct_answer: q.correct_answer.clone().unwrap_or_default(),
            })
            .collect()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthoringState {
    Empty,
    Editing,
    Valid,
    Submitting,
    Committed,
    Failed,
    Cancelled,
}

/// One author's quiz authoring session.
#[derive(Debug, Clone)]
pub struct QuizAuthoring {
    draft: QuizDraft,
    state: AuthoringState,
    history: Vec<QuizDraft>,
    tracking: CorrectAnswerTracking,
}

impl Default for QuizAuthoring {
    fn default() -> Self {
        Self::new()
    }
}

impl QuizAuthoring {
    pub fn new() -> Self {
        Self::with_tracking(CorrectAnswerTracking::default())
    }

    pub fn with_tracking(tracking: CorrectAnswerTracking) -> Self {
        Self {
            draft: QuizDraft::new(),
            state: AuthoringState::Empty,
            history: Vec::new(),
            tracking,
        }
    }

    /// Resumes a session around a draft built elsewhere, e.g. one received
    /// over the API.
    pub fn from_draft(draft: QuizDraft) -> Self {
        let mut session = Self::new();
        session.state = Self::classify(&draft);
        session.draft = draft;
        session
    }

    pub fn draft(&self) -> &QuizDraft {
        &self.draft
    }

    pub fn state(&self) -> AuthoringState {
        self.state
    }

    /// Drafts replaced by edits, oldest first.
    pub fn history(&self) -> &[QuizDraft] {
        &self.history
    }

    pub fn correct_answer_tracks_value(&self) -> bool {
        self.tracking == CorrectAnswerTracking::Value
    }

    pub fn problems(&self) -> Vec<DraftProblem> {
        self.draft.problems()
    }

    pub fn is_valid(&self) -> bool {
        self.draft.is_valid()
    }

    fn classify(draft: &QuizDraft) -> AuthoringState {
        if *draft == QuizDraft::new() {
            AuthoringState::Empty
        } else if draft.is_valid() {
            AuthoringState::Valid
        } else {
            AuthoringState::Editing
        }
    }

    fn apply(
        &mut self,
        edit: impl FnOnce(&QuizDraft) -> Result<QuizDraft, AuthoringError>,
    ) -> Result<&QuizDraft, AuthoringError> {
        if self.state == AuthoringState::Submitting {
            return Err(AuthoringError::Submitting);
        }
        let next = edit(&self.draft)?;
        let previous = std::mem::replace(&mut self.draft, next);
        self.history.push(previous);
        self.state = Self::classify(&self.draft);
        Ok(&self.draft)
    }

    pub fn edit_title(&mut self, title: impl Into<String>) -> Result<&QuizDraft, AuthoringError> {
        let title = title.into();
        self.apply(|d| Ok(d.with_title(title)))
    }

    pub fn edit_question_text(
        &mut self,
        index: usize,
        text: impl Into<String>,
    ) -> Result<&QuizDraft, AuthoringError> {
        let text = text.into();
        self.apply(|d| d.with_question_text(index, text))
    }

    pub fn edit_option_text(
        &mut self,
        index: usize,
        option: usize,
        text: impl Into<String>,
    ) -> Result<&QuizDraft, AuthoringError> {
        let text = text.into();
        let tracking = self.tracking;
        self.apply(|d| d.with_option_text(index, option, text, tracking))
    }

    pub fn mark_correct(&mut self, index: usize, option_text: &str) -> Result<&QuizDraft, AuthoringError> {
        self.apply(|d| d.with_correct_answer(index, option_text))
    }

    pub fn mark_correct_option(&mut self, index: usize, option: usize) -> Result<&QuizDraft, AuthoringError> {
        self.apply(|d| d.with_correct_option(index, option))
    }

    pub fn add_question(&mut self) -> Result<&QuizDraft, AuthoringError> {
        self.apply(|d| Ok(d.with_question_added()))
    }

    pub fn add_option(&mut self, index: usize) -> Result<&QuizDraft, AuthoringError> {
        self.apply(|d| d.with_option_added(index))
    }

    /// Restores the draft before the last edit. Returns `false` when there is
    /// nothing to undo.
    pub fn undo(&mut self) -> bool {
        if self.state == AuthoringState::Submitting {
            return false;
        }
        match self.history.pop() {
            Some(previous) => {
                self.draft = previous;
                self.state = Self::classify(&self.draft);
                true
            }
            None => false,
        }
    }

    /// Throws the draft away and starts over with a blank one. Returns the
    /// discarded draft.
    pub fn cancel(&mut self) -> Result<QuizDraft, AuthoringError> {
        if self.state == AuthoringState::Submitting {
            return Err(AuthoringError::Submitting);
        }
        self.history.clear();
        self.state = AuthoringState::Cancelled;
        Ok(std::mem::take(&mut self.draft))
    }

    /// Hands the draft to the sink exactly once.
    ///
    /// The draft is sent whether or not it is valid. On success the session
    /// starts a blank draft; on failure the draft is kept untouched so the
    /// author can retry.
    pub async fn submit<S>(&mut self, sink: &S, target: QuizTarget) -> Result<Quiz, AuthoringError>
    where
        S: QuizSink + ?Sized,
    {
        if self.state == AuthoringState::Submitting {
            return Err(AuthoringError::Submitting);
        }
        if self.state != AuthoringState::Valid {
            tracing::debug!(problems = self.draft.problems().len(), "submitting incomplete quiz draft");
        }
        let in_flight = InFlight::start(&mut self.state);

        match sink.create_quiz(target, &self.draft).await {
            Ok(quiz) => {
                tracing::info!(quiz_id = quiz.id, "quiz committed");
                in_flight.finish(AuthoringState::Committed);
                self.draft = QuizDraft::new();
                self.history.clear();
                Ok(quiz)
            }
            Err(e) => {
                tracing::warn!(error = %e, "quiz submit failed");
                in_flight.finish(AuthoringState::Failed);
                Err(e.into())
            }
        }
    }
}

/// Holds the session in `Submitting` while a submit future is alive. A future
/// dropped before the sink answered leaves the session `Failed`, draft intact.
struct InFlight<'a> {
    state: &'a mut AuthoringState,
}

impl<'a> InFlight<'a> {
    fn start(state: &'a mut AuthoringState) -> Self {
        *state = AuthoringState::Submitting;
        Self { state }
    }

    fn finish(self, outcome: AuthoringState) {
        *self.state = outcome;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if *self.state == AuthoringState::Submitting {
            tracing::warn!("quiz submit abandoned before the sink answered");
            *self.state = AuthoringState::Failed;
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CourseDraftError {
    #[error("course title is empty")]
    MissingTitle,
    #[error("course description is empty")]
    MissingDescription,
}

/// Fields an instructor fills in to create a course.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CourseDraft {
    pub title: String,
    pub description: String,
    pub category: Category,
}

impl CourseDraft {
    pub fn validate(&self) -> Result<(), CourseDraftError> {
        if self.title.is_empty() {
            return Err(CourseDraftError::MissingTitle);
        }
        if self.description.is_empty() {
            return Err(CourseDraftError::MissingDescription);
        }
        Ok(())
    }
}
