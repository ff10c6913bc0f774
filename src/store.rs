use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::{
    authoring::{CourseDraft, QuizDraft},
    catalog::Catalog,
    ledger::{EnrollmentLedger, LedgerError},
    models::*,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("{0}")]
    Invalid(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Catalog and ledger read together, so aggregation never mixes states.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub catalog: Catalog,
    pub ledger: EnrollmentLedger,
}

#[async_trait]
pub trait QuizSink: Send + Sync {
    async fn create_quiz(&self, target: QuizTarget, draft: &QuizDraft) -> Result<Quiz, StoreError>;
}

/// Persistence collaborator the HTTP layer reads snapshots from and writes
/// through.
#[async_trait]
pub trait Store: QuizSink {
    async fn snapshot(&self) -> Result<Snapshot, StoreError>;

    async fn create_course(
        &self,
        instructor_id: UserId,
        draft: &CourseDraft,
    ) -> Result<Course, StoreError>;

    async fn add_lesson(&self, course_id: CourseId, req: CreateLessonReq) -> Result<Lesson, StoreError>;

    async fn enroll(&self, user_id: UserId, course_id: CourseId) -> Result<Enrollment, StoreError>;

    async fn complete_lesson(&self, user_id: UserId, lesson_id: LessonId) -> Result<Enrollment, StoreError>;

    async fn record_attempt(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
        score: i32,
    ) -> Result<QuizAttempt, StoreError>;
}

#[derive(Debug, Default)]
struct Inner {
    snapshot: Snapshot,
    next_course: CourseId,
    next_lesson: LessonId,
    next_quiz: QuizId,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// Process-local store. Used when no database is configured and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store. Id counters continue after the highest seeded ids.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        let catalog = &snapshot.catalog;
        let inner = Inner {
            next_course: catalog.courses.iter().map(|c| c.id).max().unwrap_or(0),
            next_lesson: catalog.lessons.iter().map(|l| l.id).max().unwrap_or(0),
            next_quiz: catalog.quizzes.iter().map(|q| q.id).max().unwrap_or(0),
            snapshot,
        };
        Self { inner: RwLock::new(inner) }
    }
}

#[async_trait]
impl QuizSink for MemoryStore {
    async fn create_quiz(&self, target: QuizTarget, draft: &QuizDraft) -> Result<Quiz, StoreError> {
        let mut inner = self.inner.write().await;
        let quiz = Quiz {
            id: inner.next_quiz + 1,
            target,
            title: draft.title.clone(),
            questions: draft.to_questions(),
        };
        if !inner.snapshot.catalog.push_quiz(quiz.clone()) {
            return Err(match target {
                QuizTarget::Lesson(id) => LedgerError::UnknownLesson(id),
                QuizTarget::Course(id) => LedgerError::UnknownCourse(id),
            }
            .into());
        }
        next_id(&mut inner.next_quiz);
        Ok(quiz)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(self.inner.read().await.snapshot.clone())
    }

    async fn create_course(
        &self,
        instructor_id: UserId,
        draft: &CourseDraft,
    ) -> Result<Course, StoreError> {
        draft.validate().map_err(|e| StoreError::Invalid(e.to_string()))?;
        let mut inner = self.inner.write().await;
        let course = Course {
            id: next_id(&mut inner.next_course),
            title: draft.title.clone(),
            description: draft.description.clone(),
            instructor_id,
            category: draft.category,
            lesson_ids: Vec::new(),
            quiz_ids: Vec::new(),
        };
        inner.snapshot.catalog.push_course(course.clone());
        Ok(course)
    }

    async fn add_lesson(&self, course_id: CourseId, req: CreateLessonReq) -> Result<Lesson, StoreError> {
        let mut inner = self.inner.write().await;
        let id = inner.next_lesson + 1;
        let lesson = Lesson {
            id,
            course_id,
            title: req.title,
            video_url: req.video_url,
            captions_url: req.captions_url,
            position: 0,
        };
        if !inner.snapshot.catalog.push_lesson(lesson.clone()) {
            return Err(LedgerError::UnknownCourse(course_id).into());
        }
        next_id(&mut inner.next_lesson);
        // position is assigned by the catalog
        Ok(inner.snapshot.catalog.lesson(id).cloned().unwrap_or(lesson))
    }

    async fn enroll(&self, user_id: UserId, course_id: CourseId) -> Result<Enrollment, StoreError> {
        let mut inner = self.inner.write().await;
        let Snapshot { catalog, ledger } = &mut inner.snapshot;
        Ok(ledger.enroll(catalog, user_id, course_id)?)
    }

    async fn complete_lesson(&self, user_id: UserId, lesson_id: LessonId) -> Result<Enrollment, StoreError> {
        let mut inner = self.inner.write().await;
        let Snapshot { catalog, ledger } = &mut inner.snapshot;
        Ok(ledger.complete_lesson(catalog, user_id, lesson_id)?)
    }

    async fn record_attempt(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
        score: i32,
    ) -> Result<QuizAttempt, StoreError> {
        let mut inner = self.inner.write().await;
        let Snapshot { catalog, ledger } = &mut inner.snapshot;
        Ok(ledger.record_attempt(catalog, user_id, quiz_id, score)?)
    }
}
