use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    analytics::{self, AnalyticsSnapshot},
    authoring::{AuthoringError, DraftProblem, QuizAuthoring, QuizDraft},
    catalog::CourseDetail,
    dashboard::{self, Role, RoleView, RECENT_COURSES},
    filter::{self, CategoryFilter},
    ledger::LedgerError,
    models::*,
    store::{Store, StoreError},
};

pub type SharedStore = Arc<dyn Store>;

pub fn router(store: SharedStore) -> Router {
    Router::new()
        // catalog
        .route("/api/courses", get(list_courses).post(create_course))
        .route("/api/courses/featured", get(featured_courses))
        .route("/api/courses/:course_id", get(get_course))
        .route("/api/courses/:course_id/lessons", post(add_lesson))
        .route("/api/lectures", get(list_lectures))
        // ledger
        .route("/api/enrollments", post(enroll))
        .route("/api/completions", post(complete_lesson))
        .route("/api/attempts", post(record_attempt))
        // dashboards
        .route("/api/dashboard", get(dashboard))
        .route("/api/instructors/:instructor_id/analytics", get(instructor_analytics))
        // quiz authoring
        .route("/api/quizzes/validate", post(validate_quiz))
        .route("/api/quizzes", post(submit_quiz))
        .with_state(store)
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

#[derive(Deserialize, Debug, Default)]
struct CourseQuery {
    search: Option<String>,
    category: Option<String>,
}

async fn list_courses(
    State(store): State<SharedStore>,
    Query(q): Query<CourseQuery>,
) -> ApiResult<Vec<Course>> {
    let snapshot = store.snapshot().await.map_err(store_err)?;
    let category: CategoryFilter = q
        .category
        .as_deref()
        .unwrap_or("all")
        .parse()
        .unwrap_or(CategoryFilter::All);
    let found = filter::filter_courses(
        &snapshot.catalog.courses,
        q.search.as_deref().unwrap_or(""),
        &category,
    );
    Ok(Json(found.into_iter().cloned().collect()))
}

async fn featured_courses(State(store): State<SharedStore>) -> ApiResult<Vec<Course>> {
    let snapshot = store.snapshot().await.map_err(store_err)?;
    Ok(Json(snapshot.catalog.featured(RECENT_COURSES).to_vec()))
}

async fn create_course(
    State(store): State<SharedStore>,
    Json(req): Json<CreateCourseReq>,
) -> ApiResult<Course> {
    req.draft.validate().map_err(e400)?;
    let course = store
        .create_course(req.instructor_id, &req.draft)
        .await
        .map_err(store_err)?;
    Ok(Json(course))
}

async fn get_course(
    State(store): State<SharedStore>,
    Path(course_id): Path<CourseId>,
) -> ApiResult<CourseDetail> {
    let snapshot = store.snapshot().await.map_err(store_err)?;
    snapshot
        .catalog
        .course_detail(course_id)
        .map(Json)
        .ok_or_else(|| e404(format!("course {course_id} not found")))
}

async fn add_lesson(
    State(store): State<SharedStore>,
    Path(course_id): Path<CourseId>,
    Json(req): Json<CreateLessonReq>,
) -> ApiResult<Lesson> {
    if req.title.is_empty() {
        return Err(e400("lesson title is required"));
    }
    let lesson = store.add_lesson(course_id, req).await.map_err(store_err)?;
    Ok(Json(lesson))
}

#[derive(Deserialize, Debug, Default)]
struct LectureQuery {
    course: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct LecturesResp {
    pub lectures: Vec<Lecture>,
    /// Titles offered by the course selector.
    pub courses: Vec<String>,
}

async fn list_lectures(
    State(store): State<SharedStore>,
    Query(q): Query<LectureQuery>,
) -> ApiResult<LecturesResp> {
    let snapshot = store.snapshot().await.map_err(store_err)?;
    let all = snapshot.catalog.lectures();
    let lectures = filter::filter_lectures(&all, q.course.as_deref().unwrap_or("all"))
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(LecturesResp {
        courses: filter::lecture_course_titles(&all),
        lectures,
    }))
}

async fn enroll(State(store): State<SharedStore>, Json(req): Json<EnrollReq>) -> ApiResult<Enrollment> {
    let enrollment = store
        .enroll(req.user_id, req.course_id)
        .await
        .map_err(store_err)?;
    Ok(Json(enrollment))
}

async fn complete_lesson(
    State(store): State<SharedStore>,
    Json(req): Json<CompleteLessonReq>,
) -> ApiResult<Enrollment> {
    let enrollment = store
        .complete_lesson(req.user_id, req.lesson_id)
        .await
        .map_err(store_err)?;
    Ok(Json(enrollment))
}

async fn record_attempt(
    State(store): State<SharedStore>,
    Json(req): Json<RecordAttemptReq>,
) -> ApiResult<QuizAttempt> {
    let attempt = store
        .record_attempt(req.user_id, req.quiz_id, req.score)
        .await
        .map_err(store_err)?;
    Ok(Json(attempt))
}

#[derive(Deserialize, Debug)]
struct DashboardQuery {
    user_id: UserId,
    role: Option<String>,
}

async fn dashboard(
    State(store): State<SharedStore>,
    Query(q): Query<DashboardQuery>,
) -> ApiResult<RoleView> {
    let role: Role = q.role.as_deref().unwrap_or("").parse().unwrap_or(Role::Unknown);
    let snapshot = store.snapshot().await.map_err(store_err)?;
    let view = dashboard::compose_dashboard(
        role,
        q.user_id,
        &snapshot.catalog.courses,
        snapshot.ledger.enrollments(),
    );
    Ok(Json(view))
}

async fn instructor_analytics(
    State(store): State<SharedStore>,
    Path(instructor_id): Path<UserId>,
) -> ApiResult<AnalyticsSnapshot> {
    let snapshot = store.snapshot().await.map_err(store_err)?;
    let stats = analytics::instructor_stats(&snapshot.catalog, &snapshot.ledger, instructor_id);
    Ok(Json(analytics::analytics_snapshot(&stats)))
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ValidationResp {
    pub valid: bool,
    pub problems: Vec<DraftProblem>,
}

async fn validate_quiz(Json(draft): Json<QuizDraft>) -> ApiResult<ValidationResp> {
    let problems = draft.problems();
    Ok(Json(ValidationResp {
        valid: problems.is_empty(),
        problems,
    }))
}

async fn submit_quiz(State(store): State<SharedStore>, Json(req): Json<SubmitQuizReq>) -> ApiResult<Quiz> {
    let mut session = QuizAuthoring::from_draft(req.draft);
    let quiz = session
        .submit(store.as_ref(), req.target)
        .await
        .map_err(|e| match e {
            AuthoringError::Store(e) => store_err(e),
            other => e400(other),
        })?;
    Ok(Json(quiz))
}

// --- helpers ---
fn store_err(e: StoreError) -> (StatusCode, String) {
    match e {
        StoreError::Ledger(
            ref l @ (LedgerError::UnknownCourse(_)
            | LedgerError::UnknownLesson(_)
            | LedgerError::UnknownQuiz(_)),
        ) => e404(l.to_string()),
        StoreError::Ledger(l) => e400(l),
        StoreError::Invalid(msg) => e400(msg),
        other => e500(other),
    }
}

fn e400<T: ToString>(msg: T) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, msg.to_string())
}

fn e404<T: Into<String>>(msg: T) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, msg.into())
}

fn e500<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    tracing::error!(error=%e, "internal error");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
