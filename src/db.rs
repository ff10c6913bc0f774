use anyhow::Result;
use async_trait::async_trait;
use sqlx::{types::Json, FromRow, Pool, Postgres};

use crate::{
    authoring::{CourseDraft, QuizDraft},
    catalog::Catalog,
    ledger::{check_progress, check_score, progress_from_completions, EnrollmentLedger, LedgerError},
    models::*,
    store::{QuizSink, Snapshot, Store, StoreError},
};

pub type Db = Pool<Postgres>;

pub async fn connect(url: &str) -> Result<Db> {
    Ok(Pool::<Postgres>::connect(url).await?)
}

#[derive(FromRow)]
struct CourseRow {
    id: CourseId,
    title: String,
    description: String,
    instructor_id: UserId,
    category: String,
}

impl TryFrom<CourseRow> for Course {
    type Error = StoreError;

    fn try_from(row: CourseRow) -> Result<Self, Self::Error> {
        Ok(Course {
            id: row.id,
            title: row.title,
            description: row.description,
            instructor_id: row.instructor_id,
            category: row
                .category
                .parse()
                .map_err(|e: UnknownCategory| StoreError::Invalid(e.to_string()))?,
            lesson_ids: Vec::new(),
            quiz_ids: Vec::new(),
        })
    }
}

#[derive(FromRow)]
struct QuizRow {
    id: QuizId,
    lesson_id: Option<LessonId>,
    course_id: Option<CourseId>,
    title: String,
    questions: Json<Vec<Question>>,
}

impl TryFrom<QuizRow> for Quiz {
    type Error = StoreError;

    fn try_from(row: QuizRow) -> Result<Self, Self::Error> {
        let target = match (row.lesson_id, row.course_id) {
            (Some(id), _) => QuizTarget::Lesson(id),
            (None, Some(id)) => QuizTarget::Course(id),
            (None, None) => {
                return Err(StoreError::Invalid(format!("quiz {} has no attachment point", row.id)))
            }
        };
        Ok(Quiz {
            id: row.id,
            target,
            title: row.title,
            questions: row.questions.0,
        })
    }
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

/// Maps a foreign key violation to the missing parent, anything else to a
/// storage error.
fn missing_parent(e: sqlx::Error, parent: LedgerError) -> StoreError {
    if is_foreign_key_violation(&e) {
        parent.into()
    } else {
        e.into()
    }
}

/// Postgres-backed store. Each write runs in one transaction and reads only
/// the rows its checks need.
#[derive(Clone)]
pub struct PgStore {
    pool: Db,
}

impl PgStore {
    pub fn new(pool: Db) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuizSink for PgStore {
    async fn create_quiz(&self, target: QuizTarget, draft: &QuizDraft) -> Result<Quiz, StoreError> {
        let (lesson_id, course_id, parent) = match target {
            QuizTarget::Lesson(id) => (Some(id), None, LedgerError::UnknownLesson(id)),
            QuizTarget::Course(id) => (None, Some(id), LedgerError::UnknownCourse(id)),
        };

        let row: QuizRow = sqlx::query_as(
            r#"
            INSERT INTO quizzes (lesson_id, course_id, title, questions)
            VALUES ($1,$2,$3,$4)
            RETURNING id, lesson_id, course_id, title, questions
            "#,
        )
        .bind(lesson_id)
        .bind(course_id)
        .bind(&draft.title)
        .bind(Json(draft.to_questions()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| missing_parent(e, parent))?;

        tracing::info!(quiz_id = row.id, "quiz created");
        row.try_into()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let courses: Vec<CourseRow> = sqlx::query_as(
            "SELECT id, title, description, instructor_id, category FROM courses ORDER BY id",
        )
        .fetch_all(&mut *tx)
        .await?;
        let lessons: Vec<Lesson> = sqlx::query_as(
            r#"SELECT id, course_id, title, video_url, captions_url, position
               FROM lessons ORDER BY course_id, position, id"#,
        )
        .fetch_all(&mut *tx)
        .await?;
        let quizzes: Vec<QuizRow> = sqlx::query_as(
            "SELECT id, lesson_id, course_id, title, questions FROM quizzes ORDER BY id",
        )
        .fetch_all(&mut *tx)
        .await?;
        let enrollments: Vec<Enrollment> = sqlx::query_as(
            "SELECT user_id, course_id, progress, created_at FROM enrollments ORDER BY created_at, user_id",
        )
        .fetch_all(&mut *tx)
        .await?;
        let completions: Vec<LessonCompletion> = sqlx::query_as(
            "SELECT user_id, lesson_id, completed_at FROM lesson_completions ORDER BY completed_at",
        )
        .fetch_all(&mut *tx)
        .await?;
        let attempts: Vec<QuizAttempt> = sqlx::query_as(
            "SELECT user_id, quiz_id, score, created_at FROM quiz_attempts ORDER BY id",
        )
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let mut catalog = Catalog::default();
        for row in courses {
            catalog.push_course(row.try_into()?);
        }
        for lesson in lessons {
            if !catalog.push_lesson(lesson) {
                tracing::warn!("skipping lesson of unknown course");
            }
        }
        for row in quizzes {
            let quiz: Quiz = row.try_into()?;
            if !catalog.push_quiz(quiz) {
                tracing::warn!("skipping quiz with unknown attachment point");
            }
        }

        Ok(Snapshot {
            catalog,
            ledger: EnrollmentLedger::from_parts(enrollments, completions, attempts),
        })
    }

    async fn create_course(
        &self,
        instructor_id: UserId,
        draft: &CourseDraft,
    ) -> Result<Course, StoreError> {
        draft.validate().map_err(|e| StoreError::Invalid(e.to_string()))?;
        let row: CourseRow = sqlx::query_as(
            r#"
            INSERT INTO courses (title, description, instructor_id, category)
            VALUES ($1,$2,$3,$4)
            RETURNING id, title, description, instructor_id, category
            "#,
        )
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(instructor_id)
        .bind(draft.category.as_str())
        .fetch_one(&self.pool)
        .await?;
        tracing::info!(course_id = row.id, instructor_id, "course created");
        row.try_into()
    }

    async fn add_lesson(&self, course_id: CourseId, req: CreateLessonReq) -> Result<Lesson, StoreError> {
        let mut tx = self.pool.begin().await?;
        // the course row lock serialises position assignment
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM courses WHERE id=$1 FOR UPDATE")
            .bind(course_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(LedgerError::UnknownCourse(course_id).into());
        }

        let lesson: Lesson = sqlx::query_as(
            r#"
            INSERT INTO lessons (course_id, title, video_url, captions_url, position)
            VALUES ($1,$2,$3,$4,(SELECT COUNT(*)::INT FROM lessons WHERE course_id=$1))
            RETURNING id, course_id, title, video_url, captions_url, position
            "#,
        )
        .bind(course_id)
        .bind(&req.title)
        .bind(&req.video_url)
        .bind(&req.captions_url)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(lesson)
    }

    async fn enroll(&self, user_id: UserId, course_id: CourseId) -> Result<Enrollment, StoreError> {
        let enrollment: Option<Enrollment> = sqlx::query_as(
            r#"
            INSERT INTO enrollments (user_id, course_id, progress) VALUES ($1,$2,0)
            ON CONFLICT (user_id, course_id) DO NOTHING
            RETURNING user_id, course_id, progress, created_at
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| missing_parent(e, LedgerError::UnknownCourse(course_id)))?;

        let enrollment = enrollment.ok_or(LedgerError::AlreadyEnrolled { user_id, course_id })?;
        tracing::info!(user_id, course_id, "enrolled");
        Ok(enrollment)
    }

    async fn complete_lesson(&self, user_id: UserId, lesson_id: LessonId) -> Result<Enrollment, StoreError> {
        let mut tx = self.pool.begin().await?;
        let course_id: CourseId = sqlx::query_scalar("SELECT course_id FROM lessons WHERE id=$1")
            .bind(lesson_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(LedgerError::UnknownLesson(lesson_id))?;

        // concurrent completions for one enrollment queue on this lock, so
        // each recount sees the completions committed before it
        let enrolled: Option<i32> = sqlx::query_scalar(
            "SELECT progress FROM enrollments WHERE user_id=$1 AND course_id=$2 FOR UPDATE",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await?;
        if enrolled.is_none() {
            return Err(LedgerError::NotEnrolled { user_id, course_id }.into());
        }

        sqlx::query(
            r#"INSERT INTO lesson_completions (user_id, lesson_id) VALUES ($1,$2)
               ON CONFLICT (user_id, lesson_id) DO NOTHING"#,
        )
        .bind(user_id)
        .bind(lesson_id)
        .execute(&mut *tx)
        .await?;

        let (done, total): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM lesson_completions c
                   JOIN lessons l ON l.id = c.lesson_id
                  WHERE c.user_id=$1 AND l.course_id=$2),
                (SELECT COUNT(*) FROM lessons WHERE course_id=$2)
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await?;
        let progress = check_progress(progress_from_completions(done as usize, total as usize))?;

        let enrollment: Enrollment = sqlx::query_as(
            r#"
            UPDATE enrollments SET progress=$3 WHERE user_id=$1 AND course_id=$2
            RETURNING user_id, course_id, progress, created_at
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(progress)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(user_id, lesson_id, progress, "lesson completed");
        Ok(enrollment)
    }

    async fn record_attempt(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
        score: i32,
    ) -> Result<QuizAttempt, StoreError> {
        let score = check_score(score)?;
        let attempt: QuizAttempt = sqlx::query_as(
            r#"
            INSERT INTO quiz_attempts (user_id, quiz_id, score) VALUES ($1,$2,$3)
            RETURNING user_id, quiz_id, score, created_at
            "#,
        )
        .bind(user_id)
        .bind(quiz_id)
        .bind(score)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| missing_parent(e, LedgerError::UnknownQuiz(quiz_id)))?;
        Ok(attempt)
    }
}
