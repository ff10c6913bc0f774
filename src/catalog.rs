use serde::{Deserialize, Serialize};

use crate::models::*;

/// Read-only view of courses, their lessons and their quizzes.
///
/// Lessons keep the order they were inserted in; that order is the order a
/// course presents them in.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub courses: Vec<Course>,
    pub lessons: Vec<Lesson>,
    pub quizzes: Vec<Quiz>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CourseDetail {
    pub course: Course,
    pub lessons: Vec<Lesson>,
    pub quizzes: Vec<Quiz>,
    pub first_lesson: Option<Lesson>,
}

impl Catalog {
    pub fn course(&self, id: CourseId) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == id)
    }

    pub fn lesson(&self, id: LessonId) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.id == id)
    }

    pub fn quiz(&self, id: QuizId) -> Option<&Quiz> {
        self.quizzes.iter().find(|q| q.id == id)
    }

    pub fn courses_by_instructor(&self, instructor_id: UserId) -> Vec<&Course> {
        self.courses
            .iter()
            .filter(|c| c.instructor_id == instructor_id)
            .collect()
    }

    /// Lessons of a course in display order. Follows the course's own
    /// `lesson_ids` list, skipping ids the catalog has no record for.
    pub fn lessons_for(&self, course_id: CourseId) -> Vec<&Lesson> {
        match self.course(course_id) {
            Some(course) => course
                .lesson_ids
                .iter()
                .filter_map(|id| self.lesson(*id))
                .collect(),
            None => Vec::new(),
        }
    }

    /// The first `count` courses in catalog order, as promoted on the home
    /// page.
    pub fn featured(&self, count: usize) -> &[Course] {
        &self.courses[..count.min(self.courses.len())]
    }

    pub fn first_lesson(&self, course_id: CourseId) -> Option<&Lesson> {
        self.lessons_for(course_id).into_iter().next()
    }

    /// Quizzes attached to the course directly or to one of its lessons.
    pub fn quizzes_for(&self, course_id: CourseId) -> Vec<&Quiz> {
        self.quizzes
            .iter()
            .filter(|q| self.quiz_course(q) == Some(course_id))
            .collect()
    }

    /// Course a quiz ultimately belongs to.
    pub fn quiz_course(&self, quiz: &Quiz) -> Option<CourseId> {
        match quiz.target {
            QuizTarget::Course(id) => Some(id),
            QuizTarget::Lesson(id) => self.lesson(id).map(|l| l.course_id),
        }
    }

    pub fn course_detail(&self, course_id: CourseId) -> Option<CourseDetail> {
        let course = self.course(course_id)?.clone();
        Some(CourseDetail {
            lessons: self.lessons_for(course_id).into_iter().cloned().collect(),
            quizzes: self.quizzes_for(course_id).into_iter().cloned().collect(),
            first_lesson: self.first_lesson(course_id).cloned(),
            course,
        })
    }

    /// Every lesson paired with its course title, in catalog order.
    pub fn lectures(&self) -> Vec<Lecture> {
        self.lessons
            .iter()
            .filter_map(|lesson| {
                self.course(lesson.course_id).map(|c| Lecture {
                    lesson: lesson.clone(),
                    course_title: c.title.clone(),
                })
            })
            .collect()
    }

    // --- mutation, used by the in-memory store ---

    pub fn push_course(&mut self, course: Course) {
        self.courses.push(course);
    }

    /// Appends a lesson at the end of its course. Returns `false` when the
    /// course is unknown.
    pub fn push_lesson(&mut self, mut lesson: Lesson) -> bool {
        let Some(course) = self.courses.iter_mut().find(|c| c.id == lesson.course_id) else {
            return false;
        };
        lesson.position = course.lesson_ids.len() as i32;
        course.lesson_ids.push(lesson.id);
        self.lessons.push(lesson);
        true
    }

    /// Attaches a quiz to its course's quiz list. Returns `false` when the
    /// attachment point is unknown.
    pub fn push_quiz(&mut self, quiz: Quiz) -> bool {
        let Some(course_id) = self.quiz_course(&quiz) else {
            return false;
        };
        let Some(course) = self.courses.iter_mut().find(|c| c.id == course_id) else {
            return false;
        };
        course.quiz_ids.push(quiz.id);
        self.quizzes.push(quiz);
        true
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn course(id: CourseId, instructor_id: UserId, title: &str, category: Category) -> Course {
        Course {
            id,
            title: title.to_string(),
            description: format!("About {title}"),
            instructor_id,
            category,
            lesson_ids: Vec::new(),
            quiz_ids: Vec::new(),
        }
    }

    pub fn lesson(id: LessonId, course_id: CourseId, title: &str) -> Lesson {
        Lesson {
            id,
            course_id,
            title: title.to_string(),
            video_url: None,
            captions_url: None,
            position: 0,
        }
    }

    pub fn quiz(id: QuizId, target: QuizTarget) -> Quiz {
        Quiz {
            id,
            target,
            title: format!("Quiz {id}"),
            questions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn sample() -> Catalog {
        let mut catalog = Catalog::default();
        catalog.push_course(course(1, 10, "Rust", Category::Programming));
        catalog.push_course(course(2, 11, "Color", Category::Design));
        assert!(catalog.push_lesson(lesson(100, 1, "Ownership")));
        assert!(catalog.push_lesson(lesson(101, 1, "Borrowing")));
        assert!(catalog.push_lesson(lesson(200, 2, "Hue")));
        assert!(catalog.push_quiz(quiz(1000, QuizTarget::Lesson(101))));
        assert!(catalog.push_quiz(quiz(1001, QuizTarget::Course(2))));
        catalog
    }

    #[test]
    fn lessons_follow_insertion_order() {
        let catalog = sample();
        let titles: Vec<_> = catalog.lessons_for(1).iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, ["Ownership", "Borrowing"]);
        assert_eq!(catalog.lesson(101).map(|l| l.position), Some(1));
        assert_eq!(catalog.first_lesson(1).map(|l| l.id), Some(100));
    }

    #[test]
    fn unknown_parents_are_rejected() {
        let mut catalog = sample();
        assert!(!catalog.push_lesson(lesson(300, 99, "Orphan")));
        assert!(!catalog.push_quiz(quiz(2000, QuizTarget::Lesson(999))));
        assert!(catalog.lesson(300).is_none());
    }

    #[test]
    fn quizzes_resolve_through_lessons() {
        let catalog = sample();
        let ids: Vec<_> = catalog.quizzes_for(1).iter().map(|q| q.id).collect();
        assert_eq!(ids, [1000]);
        assert_eq!(catalog.course(1).map(|c| c.quiz_ids.clone()), Some(vec![1000]));
        assert_eq!(catalog.course(2).map(|c| c.quiz_ids.clone()), Some(vec![1001]));
    }

    #[test]
    fn course_detail_opens_on_first_lesson() {
        let catalog = sample();
        let detail = catalog.course_detail(2).unwrap();
        assert_eq!(detail.first_lesson.map(|l| l.id), Some(200));
        assert_eq!(detail.quizzes.len(), 1);
        assert!(catalog.course_detail(42).is_none());
    }

    #[test]
    fn featured_takes_leading_courses() {
        let catalog = sample();
        let ids: Vec<_> = catalog.featured(1).iter().map(|c| c.id).collect();
        assert_eq!(ids, [1]);
        assert_eq!(catalog.featured(3).len(), 2);
        assert!(Catalog::default().featured(3).is_empty());
    }

    #[test]
    fn lectures_carry_course_titles() {
        let lectures = sample().lectures();
        assert_eq!(lectures.len(), 3);
        assert_eq!(lectures[2].course_title, "Color");
    }
}
