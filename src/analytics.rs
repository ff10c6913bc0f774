//! Rollups behind the dashboards.
//!
//! Every function here is total: empty or missing input degrades the metric
//! to 0 instead of failing. Percentages are rounded half-up exactly once, at
//! the outer boundary of each metric.

use serde::{Deserialize, Serialize};

use crate::{catalog::Catalog, ledger::EnrollmentLedger, models::*};

/// Rounds to the nearest integer with halves going up (`2.5 -> 3`,
/// `-2.5 -> -2`).
pub fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

fn mean(sum: i64, len: usize) -> Option<f64> {
    (len > 0).then(|| sum as f64 / len as f64)
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CourseRollup {
    pub enrolled_count: usize,
    pub completed_count: usize,
    pub average_progress: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CourseStats {
    pub total_enrollments: i64,
    pub enrollment_rate: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuizMetrics {
    pub average_score: i64,
    pub completion_rate: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LessonMetrics {
    pub completed_lessons: i64,
    pub completion_rate: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub course_stats: CourseStats,
    pub quiz_metrics: QuizMetrics,
    pub completion_rates: LessonMetrics,
}

/// Stored progress for the (user, course) pair, or 0 when the user never
/// enrolled.
pub fn enrollment_progress(enrollments: &[Enrollment], user_id: UserId, course_id: CourseId) -> i32 {
    enrollments
        .iter()
        .find(|e| e.user_id == user_id && e.course_id == course_id)
        .map(|e| e.progress)
        .unwrap_or(0)
}

/// Enrolled/completed/average summary of the courses a viewer is enrolled in.
///
/// `enrollments` must already be scoped to one viewer; a course counts as
/// enrolled when any record in the slice references it.
pub fn course_rollup(courses: &[Course], enrollments: &[Enrollment]) -> CourseRollup {
    let progress: Vec<i32> = courses
        .iter()
        .filter_map(|c| {
            enrollments
                .iter()
                .find(|e| e.course_id == c.id)
                .map(|e| e.progress)
        })
        .collect();

    let sum: i64 = progress.iter().map(|p| i64::from(*p)).sum();
    CourseRollup {
        enrolled_count: progress.len(),
        completed_count: progress.iter().filter(|p| **p == 100).count(),
        average_progress: round_half_up(sum as f64 / progress.len().max(1) as f64),
    }
}

pub fn course_stats(stats: &[CourseStat]) -> CourseStats {
    let sum: i64 = stats.iter().map(|s| s.average_progress).sum();
    CourseStats {
        total_enrollments: stats.iter().map(|s| s.enrollments).sum(),
        enrollment_rate: mean(sum, stats.len()).map(round_half_up).unwrap_or(0),
    }
}

/// Quiz rollup for an instructor.
///
/// `completion_rate` is total attempts divided by the number of courses,
/// times 100. That is attempts per course rather than a true rate; it is kept
/// as-is so dashboards show the numbers they always have.
pub fn quiz_metrics(stats: &[QuizStat], course_count: usize) -> QuizMetrics {
    if stats.is_empty() {
        return QuizMetrics::default();
    }
    let score_sum: i64 = stats.iter().map(|s| s.average_score).sum();
    let attempts: i64 = stats.iter().map(|s| s.total_attempts).sum();
    QuizMetrics {
        average_score: mean(score_sum, stats.len()).map(round_half_up).unwrap_or(0),
        completion_rate: mean(attempts, course_count)
            .map(|per_course| round_half_up(per_course * 100.0))
            .unwrap_or(0),
    }
}

pub fn lesson_metrics(stats: &[LessonStat]) -> LessonMetrics {
    let rate_sum: i64 = stats.iter().map(|s| s.completion_rate).sum();
    LessonMetrics {
        completed_lessons: stats.iter().map(|s| s.students_completed).sum(),
        completion_rate: mean(rate_sum, stats.len()).map(round_half_up).unwrap_or(0),
    }
}

pub fn analytics_snapshot(stats: &InstructorStats) -> AnalyticsSnapshot {
    AnalyticsSnapshot {
        course_stats: course_stats(&stats.courses),
        quiz_metrics: quiz_metrics(&stats.quizzes, stats.courses.len()),
        completion_rates: lesson_metrics(&stats.lessons),
    }
}

/// Raw per-course, per-quiz and per-lesson records for one instructor's
/// courses, derived from the current catalog and ledger.
pub fn instructor_stats(
    catalog: &Catalog,
    ledger: &EnrollmentLedger,
    instructor_id: UserId,
) -> InstructorStats {
    let courses = catalog.courses_by_instructor(instructor_id);
    let mut stats = InstructorStats::default();

    for course in courses {
        let enrolled: Vec<&Enrollment> = ledger
            .enrollments()
            .iter()
            .filter(|e| e.course_id == course.id)
            .collect();
        let progress_sum: i64 = enrolled.iter().map(|e| i64::from(e.progress)).sum();
        stats.courses.push(CourseStat {
            course_id: course.id,
            enrollments: enrolled.len() as i64,
            average_progress: mean(progress_sum, enrolled.len()).map(round_half_up).unwrap_or(0),
        });

        for lesson in catalog.lessons_for(course.id) {
            let completed = ledger
                .completions()
                .iter()
                .filter(|c| c.lesson_id == lesson.id)
                .count();
            stats.lessons.push(LessonStat {
                lesson_id: lesson.id,
                students_completed: completed as i64,
                completion_rate: mean(completed as i64 * 100, enrolled.len())
                    .map(round_half_up)
                    .unwrap_or(0),
            });
        }

        for quiz in catalog.quizzes_for(course.id) {
            let scores: Vec<i64> = ledger
                .attempts()
                .iter()
                .filter(|a| a.quiz_id == quiz.id)
                .map(|a| i64::from(a.score))
                .collect();
            stats.quizzes.push(QuizStat {
                quiz_id: quiz.id,
                average_score: mean(scores.iter().sum(), scores.len())
                    .map(round_half_up)
                    .unwrap_or(0),
                total_attempts: scores.len() as i64,
            });
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::*;
    use chrono::Utc;

    fn enrollment(user_id: UserId, course_id: CourseId, progress: i32) -> Enrollment {
        Enrollment { user_id, course_id, progress, created_at: Utc::now() }
    }

    fn courses(n: i64) -> Vec<Course> {
        (1..=n)
            .map(|id| course(id, 10, &format!("Course {id}"), Category::Programming))
            .collect()
    }

    #[test]
    fn rounding_goes_half_up() {
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(2.49), 2);
        assert_eq!(round_half_up(-2.5), -2);
        assert_eq!(round_half_up(0.0), 0);
    }

    #[test]
    fn missing_enrollment_means_not_started() {
        let enrollments = vec![enrollment(42, 1, 60)];
        assert_eq!(enrollment_progress(&enrollments, 42, 1), 60);
        assert_eq!(enrollment_progress(&enrollments, 42, 2), 0);
        assert_eq!(enrollment_progress(&enrollments, 7, 1), 0);
        assert_eq!(enrollment_progress(&[], 42, 1), 0);
    }

    #[test]
    fn idle_rollup_is_zero() {
        let rollup = course_rollup(&courses(3), &[]);
        assert_eq!(rollup, CourseRollup { enrolled_count: 0, completed_count: 0, average_progress: 0 });
        assert_eq!(course_rollup(&[], &[enrollment(42, 1, 50)]), CourseRollup::default());
    }

    #[test]
    fn rollup_counts_completed_and_averages_once() {
        let enrollments = vec![
            enrollment(42, 1, 100),
            enrollment(42, 2, 33),
            enrollment(42, 3, 0),
            enrollment(42, 99, 100),
        ];
        let rollup = course_rollup(&courses(3), &enrollments);
        assert_eq!(rollup.enrolled_count, 3);
        assert_eq!(rollup.completed_count, 1);
        // 133 / 3 = 44.33
        assert_eq!(rollup.average_progress, 44);
    }

    #[test]
    fn rollup_average_stays_in_percent_range() {
        for p in [0, 1, 49, 50, 99, 100] {
            let enrollments: Vec<_> = (1..=4).map(|c| enrollment(1, c, p)).collect();
            let avg = course_rollup(&courses(4), &enrollments).average_progress;
            assert!((0..=100).contains(&avg));
            assert_eq!(avg, i64::from(p));
        }
    }

    #[test]
    fn empty_quiz_stats_do_not_divide_by_zero() {
        assert_eq!(quiz_metrics(&[], 0), QuizMetrics { average_score: 0, completion_rate: 0 });
        assert_eq!(quiz_metrics(&[], 5), QuizMetrics::default());
        let stats = [QuizStat { quiz_id: 1, average_score: 70, total_attempts: 3 }];
        assert_eq!(quiz_metrics(&stats, 0).completion_rate, 0);
    }

    #[test]
    fn quiz_completion_rate_is_attempts_per_course() {
        let stats = [
            QuizStat { quiz_id: 1, average_score: 70, total_attempts: 3 },
            QuizStat { quiz_id: 2, average_score: 85, total_attempts: 4 },
        ];
        let m = quiz_metrics(&stats, 2);
        // (70 + 85) / 2 = 77.5
        assert_eq!(m.average_score, 78);
        // 7 / 2 * 100
        assert_eq!(m.completion_rate, 350);
    }

    #[test]
    fn lesson_metrics_sum_and_average() {
        assert_eq!(lesson_metrics(&[]), LessonMetrics::default());
        let stats = [
            LessonStat { lesson_id: 1, students_completed: 4, completion_rate: 80 },
            LessonStat { lesson_id: 2, students_completed: 1, completion_rate: 25 },
        ];
        assert_eq!(
            lesson_metrics(&stats),
            LessonMetrics { completed_lessons: 5, completion_rate: 53 }
        );
    }

    #[test]
    fn course_stats_guard_empty_input() {
        assert_eq!(course_stats(&[]), CourseStats::default());
        let stats = [
            CourseStat { course_id: 1, enrollments: 2, average_progress: 50 },
            CourseStat { course_id: 2, enrollments: 3, average_progress: 75 },
        ];
        assert_eq!(course_stats(&stats), CourseStats { total_enrollments: 5, enrollment_rate: 63 });
    }

    #[test]
    fn instructor_stats_are_scoped_and_derived_from_ledger() {
        let mut catalog = Catalog::default();
        catalog.push_course(course(1, 10, "Mine", Category::Design));
        catalog.push_course(course(2, 11, "Theirs", Category::Design));
        catalog.push_lesson(lesson(100, 1, "one"));
        catalog.push_lesson(lesson(101, 1, "two"));
        catalog.push_quiz(quiz(5, QuizTarget::Lesson(100)));

        let mut ledger = EnrollmentLedger::default();
        ledger.enroll(&catalog, 1, 1).unwrap();
        ledger.enroll(&catalog, 2, 1).unwrap();
        ledger.enroll(&catalog, 3, 2).unwrap();
        ledger.complete_lesson(&catalog, 1, 100).unwrap();
        ledger.complete_lesson(&catalog, 1, 101).unwrap();
        ledger.complete_lesson(&catalog, 2, 100).unwrap();
        ledger.record_attempt(&catalog, 1, 5, 90).unwrap();
        ledger.record_attempt(&catalog, 2, 5, 45).unwrap();

        let stats = instructor_stats(&catalog, &ledger, 10);
        assert_eq!(stats.courses, vec![CourseStat { course_id: 1, enrollments: 2, average_progress: 75 }]);
        assert_eq!(
            stats.lessons,
            vec![
                LessonStat { lesson_id: 100, students_completed: 2, completion_rate: 100 },
                LessonStat { lesson_id: 101, students_completed: 1, completion_rate: 50 },
            ]
        );
        assert_eq!(stats.quizzes, vec![QuizStat { quiz_id: 5, average_score: 68, total_attempts: 2 }]);

        let snapshot = analytics_snapshot(&stats);
        assert_eq!(snapshot.course_stats, CourseStats { total_enrollments: 2, enrollment_rate: 75 });
        assert_eq!(snapshot.quiz_metrics, QuizMetrics { average_score: 68, completion_rate: 200 });
        assert_eq!(snapshot.completion_rates, LessonMetrics { completed_lessons: 3, completion_rate: 75 });
    }

    #[test]
    fn instructor_without_courses_gets_zeroes() {
        let stats = instructor_stats(&Catalog::default(), &EnrollmentLedger::default(), 10);
        assert_eq!(analytics_snapshot(&stats), AnalyticsSnapshot::default());
    }
}
