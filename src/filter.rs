use serde::{Deserialize, Serialize};
use std::{convert::Infallible, str::FromStr};

use crate::models::{Category, Course, Lecture};

/// Category selector of the course browser.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum CategoryFilter {
    All,
    Only(Category),
    /// A name outside the known categories. Matches no course.
    Unknown,
}

impl FromStr for CategoryFilter {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "" | "all" => CategoryFilter::All,
            other => match other.parse::<Category>() {
                Ok(c) => CategoryFilter::Only(c),
                Err(_) => CategoryFilter::Unknown,
            },
        })
    }
}

impl CategoryFilter {
    pub fn matches(&self, category: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(c) => *c == category,
            CategoryFilter::Unknown => false,
        }
    }
}

fn matches_search(course: &Course, needle: &str) -> bool {
    needle.is_empty()
        || course.title.to_lowercase().contains(needle)
        || course.description.to_lowercase().contains(needle)
}

/// Courses whose title or description contains `search_term` (ignoring case)
/// and whose category passes `category`. Input order is kept.
pub fn filter_courses<'a>(
    courses: &'a [Course],
    search_term: &str,
    category: &CategoryFilter,
) -> Vec<&'a Course> {
    let needle = search_term.to_lowercase();
    courses
        .iter()
        .filter(|c| matches_search(c, &needle) && category.matches(c.category))
        .collect()
}

/// Lectures of the course titled `course_filter`, or all of them for "all".
pub fn filter_lectures<'a>(lectures: &'a [Lecture], course_filter: &str) -> Vec<&'a Lecture> {
    lectures
        .iter()
        .filter(|l| course_filter == "all" || l.course_title == course_filter)
        .collect()
}

/// Distinct course titles in order of first appearance.
pub fn lecture_course_titles(lectures: &[Lecture]) -> Vec<String> {
    let mut titles: Vec<String> = Vec::new();
    for lecture in lectures {
        if !titles.contains(&lecture.course_title) {
            titles.push(lecture.course_title.clone());
        }
    }
    titles
}
