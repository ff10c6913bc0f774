use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

pub type UserId = i64;
pub type CourseId = i64;
pub type LessonId = i64;
pub type QuizId = i64;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Programming,
    Design,
    Business,
    Marketing,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Programming,
        Category::Design,
        Category::Business,
        Category::Marketing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Programming => "programming",
            Category::Design => "design",
            Category::Business => "business",
            Category::Marketing => "marketing",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown course category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub description: String,
    pub instructor_id: UserId,
    pub category: Category,
    /// Display order.
    #[serde(default)]
    pub lesson_ids: Vec<LessonId>,
    #[serde(default)]
    pub quiz_ids: Vec<QuizId>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Lesson {
    pub id: LessonId,
    pub course_id: CourseId,
    pub title: String,
    pub video_url: Option<String>,
    pub captions_url: Option<String>,
    pub position: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum QuizTarget {
    Lesson(LessonId),
    Course(CourseId),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Question {
    #[serde(rename = "question")]
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Quiz {
    pub id: QuizId,
    pub target: QuizTarget,
    pub title: String,
    pub questions: Vec<Question>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Enrollment {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub progress: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LessonCompletion {
    pub user_id: UserId,
    pub lesson_id: LessonId,
    pub completed_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QuizAttempt {
    pub user_id: UserId,
    pub quiz_id: QuizId,
    pub score: i32,
    pub created_at: DateTime<Utc>,
}

/// A lesson listed together with the title of the course it belongs to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Lecture {
    pub lesson: Lesson,
    pub course_title: String,
}

// --- raw per-entity stat records ---

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CourseStat {
    pub course_id: CourseId,
    pub enrollments: i64,
    pub average_progress: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuizStat {
    pub quiz_id: QuizId,
    pub average_score: i64,
    pub total_attempts: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LessonStat {
    pub lesson_id: LessonId,
    pub students_completed: i64,
    pub completion_rate: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct InstructorStats {
    pub courses: Vec<CourseStat>,
    pub quizzes: Vec<QuizStat>,
    pub lessons: Vec<LessonStat>,
}

// --- request bodies ---

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateCourseReq {
    pub instructor_id: UserId,
    #[serde(flatten)]
    pub draft: crate::authoring::CourseDraft,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateLessonReq {
    pub title: String,
    pub video_url: Option<String>,
    pub captions_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EnrollReq {
    pub user_id: UserId,
    pub course_id: CourseId,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CompleteLessonReq {
    pub user_id: UserId,
    pub lesson_id: LessonId,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RecordAttemptReq {
    pub user_id: UserId,
    pub quiz_id: QuizId,
    pub score: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SubmitQuizReq {
    pub target: QuizTarget,
    #[serde(flatten)]
    pub draft: crate::authoring::QuizDraft,
}
