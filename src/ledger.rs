use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{analytics::round_half_up, catalog::Catalog, models::*};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("course {0} not found")]
    UnknownCourse(CourseId),
    #[error("lesson {0} not found")]
    UnknownLesson(LessonId),
    #[error("quiz {0} not found")]
    UnknownQuiz(QuizId),
    #[error("user {user_id} is already enrolled in course {course_id}")]
    AlreadyEnrolled { user_id: UserId, course_id: CourseId },
    #[error("user {user_id} is not enrolled in course {course_id}")]
    NotEnrolled { user_id: UserId, course_id: CourseId },
    #[error("progress {0} is outside 0..=100")]
    ProgressOutOfRange(i32),
    #[error("score {0} is outside 0..=100")]
    ScoreOutOfRange(i32),
}

pub fn check_progress(progress: i32) -> Result<i32, LedgerError> {
    if (0..=100).contains(&progress) {
        Ok(progress)
    } else {
        Err(LedgerError::ProgressOutOfRange(progress))
    }
}

pub fn check_score(score: i32) -> Result<i32, LedgerError> {
    if (0..=100).contains(&score) {
        Ok(score)
    } else {
        Err(LedgerError::ScoreOutOfRange(score))
    }
}

/// Progress of a course given how many of its lessons a user has finished.
/// A course without lessons stays at 0.
pub fn progress_from_completions(completed: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    let pct = round_half_up(completed.min(total) as f64 * 100.0 / total as f64);
    pct as i32
}

/// Per-(user, course) enrollment records plus the lesson completions and quiz
/// attempts progress is derived from.
///
/// Values are checked here, at write time. Readers (the aggregation engine)
/// trust what they get.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct EnrollmentLedger {
    enrollments: Vec<Enrollment>,
    completions: Vec<LessonCompletion>,
    attempts: Vec<QuizAttempt>,
}

impl EnrollmentLedger {
    pub fn from_parts(
        enrollments: Vec<Enrollment>,
        completions: Vec<LessonCompletion>,
        attempts: Vec<QuizAttempt>,
    ) -> Self {
        Self { enrollments, completions, attempts }
    }

    pub fn enrollments(&self) -> &[Enrollment] {
        &self.enrollments
    }

    pub fn completions(&self) -> &[LessonCompletion] {
        &self.completions
    }

    pub fn attempts(&self) -> &[QuizAttempt] {
        &self.attempts
    }

    pub fn enrollment(&self, user_id: UserId, course_id: CourseId) -> Option<&Enrollment> {
        self.enrollments
            .iter()
            .find(|e| e.user_id == user_id && e.course_id == course_id)
    }

    pub fn enroll(
        &mut self,
        catalog: &Catalog,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Enrollment, LedgerError> {
        if catalog.course(course_id).is_none() {
            return Err(LedgerError::UnknownCourse(course_id));
        }
        if self.enrollment(user_id, course_id).is_some() {
            return Err(LedgerError::AlreadyEnrolled { user_id, course_id });
        }
        let enrollment = Enrollment {
            user_id,
            course_id,
            progress: 0,
            created_at: Utc::now(),
        };
        self.enrollments.push(enrollment.clone());
        tracing::info!(user_id, course_id, "enrolled");
        Ok(enrollment)
    }

    pub fn set_progress(
        &mut self,
        user_id: UserId,
        course_id: CourseId,
        progress: i32,
    ) -> Result<Enrollment, LedgerError> {
        let progress = check_progress(progress)?;
        let enrollment = self
            .enrollments
            .iter_mut()
            .find(|e| e.user_id == user_id && e.course_id == course_id)
            .ok_or(LedgerError::NotEnrolled { user_id, course_id })?;
        enrollment.progress = progress;
        Ok(enrollment.clone())
    }

    /// Marks a lesson finished and recomputes the course progress. Completing
    /// the same lesson twice counts once.
    pub fn complete_lesson(
        &mut self,
        catalog: &Catalog,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Enrollment, LedgerError> {
        let lesson = catalog
            .lesson(lesson_id)
            .ok_or(LedgerError::UnknownLesson(lesson_id))?;
        let course_id = lesson.course_id;
        if self.enrollment(user_id, course_id).is_none() {
            return Err(LedgerError::NotEnrolled { user_id, course_id });
        }

        let already = self
            .completions
            .iter()
            .any(|c| c.user_id == user_id && c.lesson_id == lesson_id);
        if !already {
            self.completions.push(LessonCompletion {
                user_id,
                lesson_id,
                completed_at: Utc::now(),
            });
        }

        let course_lessons = catalog.lessons_for(course_id);
        let done = course_lessons
            .iter()
            .filter(|l| {
                self.completions
                    .iter()
                    .any(|c| c.user_id == user_id && c.lesson_id == l.id)
            })
            .count();
        let progress = progress_from_completions(done, course_lessons.len());
        tracing::info!(user_id, lesson_id, progress, "lesson completed");
        self.set_progress(user_id, course_id, progress)
    }

    pub fn record_attempt(
        &mut self,
        catalog: &Catalog,
        user_id: UserId,
        quiz_id: QuizId,
        score: i32,
    ) -> Result<QuizAttempt, LedgerError> {
        let score = check_score(score)?;
        if catalog.quiz(quiz_id).is_none() {
            return Err(LedgerError::UnknownQuiz(quiz_id));
        }
        let attempt = QuizAttempt {
            user_id,
            quiz_id,
            score,
            created_at: Utc::now(),
        };
        self.attempts.push(attempt.clone());
        Ok(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::*;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::default();
        catalog.push_course(course(1, 10, "Rust", Category::Programming));
        catalog.push_course(course(2, 10, "Empty", Category::Business));
        for (id, title) in [(100, "a"), (101, "b"), (102, "c")] {
            catalog.push_lesson(lesson(id, 1, title));
        }
        catalog.push_quiz(quiz(7, QuizTarget::Course(1)));
        catalog
    }

    #[test]
    fn enrollment_is_unique_per_pair() {
        let catalog = catalog();
        let mut ledger = EnrollmentLedger::default();
        let e = ledger.enroll(&catalog, 42, 1).unwrap();
        assert_eq!(e.progress, 0);
        assert_eq!(
            ledger.enroll(&catalog, 42, 1),
            Err(LedgerError::AlreadyEnrolled { user_id: 42, course_id: 1 })
        );
        assert!(ledger.enroll(&catalog, 43, 1).is_ok());
        assert_eq!(ledger.enroll(&catalog, 42, 9), Err(LedgerError::UnknownCourse(9)));
    }

    #[test]
    fn progress_is_validated_on_write() {
        let catalog = catalog();
        let mut ledger = EnrollmentLedger::default();
        ledger.enroll(&catalog, 42, 1).unwrap();
        assert_eq!(ledger.set_progress(42, 1, 101), Err(LedgerError::ProgressOutOfRange(101)));
        assert_eq!(ledger.set_progress(42, 1, -1), Err(LedgerError::ProgressOutOfRange(-1)));
        assert_eq!(ledger.set_progress(42, 1, 60).unwrap().progress, 60);
        assert_eq!(ledger.enrollment(42, 1).map(|e| e.progress), Some(60));
    }

    #[test]
    fn completions_drive_progress() {
        let catalog = catalog();
        let mut ledger = EnrollmentLedger::default();
        ledger.enroll(&catalog, 42, 1).unwrap();

        assert_eq!(ledger.complete_lesson(&catalog, 42, 100).unwrap().progress, 33);
        // repeated completion counts once
        assert_eq!(ledger.complete_lesson(&catalog, 42, 100).unwrap().progress, 33);
        assert_eq!(ledger.complete_lesson(&catalog, 42, 101).unwrap().progress, 67);
        assert_eq!(ledger.complete_lesson(&catalog, 42, 102).unwrap().progress, 100);
        assert_eq!(ledger.completions().len(), 3);
    }

    #[test]
    fn completion_requires_enrollment() {
        let catalog = catalog();
        let mut ledger = EnrollmentLedger::default();
        assert_eq!(
            ledger.complete_lesson(&catalog, 42, 100),
            Err(LedgerError::NotEnrolled { user_id: 42, course_id: 1 })
        );
        assert_eq!(
            ledger.complete_lesson(&catalog, 42, 555),
            Err(LedgerError::UnknownLesson(555))
        );
    }

    #[test]
    fn attempts_are_range_checked() {
        let catalog = catalog();
        let mut ledger = EnrollmentLedger::default();
        assert!(ledger.record_attempt(&catalog, 42, 7, 80).is_ok());
        assert_eq!(ledger.record_attempt(&catalog, 42, 7, 120), Err(LedgerError::ScoreOutOfRange(120)));
        assert_eq!(ledger.record_attempt(&catalog, 42, 8, 50), Err(LedgerError::UnknownQuiz(8)));
        assert_eq!(ledger.attempts().len(), 1);
    }

    #[test]
    fn lessonless_course_stays_at_zero() {
        assert_eq!(progress_from_completions(0, 0), 0);
        assert_eq!(progress_from_completions(1, 2), 50);
        assert_eq!(progress_from_completions(5, 3), 100);
    }
}
