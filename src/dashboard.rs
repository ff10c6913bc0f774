use serde::{Deserialize, Serialize};
use std::{convert::Infallible, str::FromStr};

use crate::{
    analytics::{course_rollup, enrollment_progress, CourseRollup},
    models::*,
};

/// How many courses the admin dashboard lists under "recent" and the home
/// page features.
pub const RECENT_COURSES: usize = 3;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
    #[serde(other)]
    Unknown,
}

impl FromStr for Role {
    type Err = Infallible;

    /// Never fails: anything unrecognised is `Role::Unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "student" => Role::Student,
            "instructor" => Role::Instructor,
            "admin" => Role::Admin,
            _ => Role::Unknown,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StudentCourse {
    pub course: Course,
    pub progress: i32,
    pub completed: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum RoleView {
    Student {
        courses: Vec<StudentCourse>,
        summary: CourseRollup,
    },
    Instructor {
        courses: Vec<Course>,
    },
    Admin {
        total_courses: usize,
        recent_courses: Vec<Course>,
    },
    /// Shown to viewers whose role we do not recognise. Nothing is listed.
    Empty,
}

pub fn compose_dashboard(
    role: Role,
    user_id: UserId,
    courses: &[Course],
    enrollments: &[Enrollment],
) -> RoleView {
    match role {
        Role::Student => student_view(user_id, courses, enrollments),
        Role::Instructor => instructor_view(user_id, courses),
        Role::Admin => admin_view(courses),
        Role::Unknown => {
            tracing::debug!(user_id, "unrecognised role, composing empty dashboard");
            RoleView::Empty
        }
    }
}

fn student_view(user_id: UserId, courses: &[Course], enrollments: &[Enrollment]) -> RoleView {
    let mine: Vec<Enrollment> = enrollments
        .iter()
        .filter(|e| e.user_id == user_id)
        .cloned()
        .collect();

    let enrolled: Vec<StudentCourse> = courses
        .iter()
        .filter(|c| mine.iter().any(|e| e.course_id == c.id))
        .map(|c| {
            let progress = enrollment_progress(&mine, user_id, c.id);
            StudentCourse {
                course: c.clone(),
                progress,
                completed: progress == 100,
            }
        })
        .collect();

    RoleView::Student {
        summary: course_rollup(courses, &mine),
        courses: enrolled,
    }
}

fn instructor_view(user_id: UserId, courses: &[Course]) -> RoleView {
    RoleView::Instructor {
        courses: courses
            .iter()
            .filter(|c| c.instructor_id == user_id)
            .cloned()
            .collect(),
    }
}

fn admin_view(courses: &[Course]) -> RoleView {
    RoleView::Admin {
        total_courses: courses.len(),
        recent_courses: courses.iter().take(RECENT_COURSES).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::course;
    use chrono::Utc;

    fn enrollment(user_id: UserId, course_id: CourseId, progress: i32) -> Enrollment {
        Enrollment { user_id, course_id, progress, created_at: Utc::now() }
    }

    #[test]
    fn roles_parse_permissively() {
        assert_eq!("student".parse::<Role>(), Ok(Role::Student));
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("superuser".parse::<Role>(), Ok(Role::Unknown));
        assert_eq!(serde_json::from_str::<Role>("\"guest\"").unwrap(), Role::Unknown);
    }

    #[test]
    fn student_sees_own_enrollment_with_progress() {
        let courses = vec![course(1, 7, "Rust", Category::Programming)];
        let enrollments = vec![enrollment(42, 1, 60)];
        let RoleView::Student { courses, summary } =
            compose_dashboard(Role::Student, 42, &courses, &enrollments)
        else {
            panic!("expected student view");
        };
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].course.id, 1);
        assert_eq!(courses[0].progress, 60);
        assert!(!courses[0].completed);
        assert_eq!(summary.average_progress, 60);
    }

    #[test]
    fn student_ignores_other_users_enrollments() {
        let courses = vec![
            course(1, 7, "Rust", Category::Programming),
            course(2, 7, "Go", Category::Programming),
        ];
        let enrollments = vec![enrollment(42, 2, 100), enrollment(43, 1, 50)];
        let view = compose_dashboard(Role::Student, 42, &courses, &enrollments);
        let RoleView::Student { courses, summary } = view else {
            panic!("expected student view");
        };
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].course.id, 2);
        assert!(courses[0].completed);
        assert_eq!(summary, CourseRollup { enrolled_count: 1, completed_count: 1, average_progress: 100 });
    }

    #[test]
    fn instructor_sees_only_own_courses() {
        let courses = vec![
            course(1, 7, "Mine", Category::Design),
            course(2, 8, "Not mine", Category::Design),
            course(3, 7, "Also mine", Category::Business),
        ];
        let view = compose_dashboard(Role::Instructor, 7, &courses, &[enrollment(7, 2, 10)]);
        let RoleView::Instructor { courses } = view else {
            panic!("expected instructor view");
        };
        let ids: Vec<_> = courses.iter().map(|c| c.id).collect();
        assert_eq!(ids, [1, 3]);
    }

    #[test]
    fn admin_recent_courses_keep_input_order() {
        let courses: Vec<_> = [5, 3, 9, 1, 7]
            .into_iter()
            .map(|id| course(id, 1, &format!("c{id}"), Category::Marketing))
            .collect();
        let view = compose_dashboard(Role::Admin, 1, &courses, &[]);
        let RoleView::Admin { total_courses, recent_courses } = view else {
            panic!("expected admin view");
        };
        assert_eq!(total_courses, 5);
        let ids: Vec<_> = recent_courses.iter().map(|c| c.id).collect();
        assert_eq!(ids, [5, 3, 9]);
    }

    #[test]
    fn unknown_role_gets_empty_view() {
        let courses = vec![course(1, 7, "Rust", Category::Programming)];
        let view = compose_dashboard(Role::Unknown, 7, &courses, &[enrollment(7, 1, 10)]);
        assert_eq!(view, RoleView::Empty);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json, serde_json::json!({ "role": "empty" }));
    }
}
