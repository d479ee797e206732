use std::fmt;

use serde::Serialize;

/// The three length-prefixed sections of a registry file, in file order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Section {
    Courses,
    Students,
    Enrollments,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Courses => "course",
            Section::Students => "student",
            Section::Enrollments => "enrollment",
        };
        f.write_str(name)
    }
}

/// Identifies the record a lookup was made for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Student(u32),
    Course(u32),
    Enrollment { student_id: u32, course_id: u32 },
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Student(id) => write!(f, "student {}", id),
            Entity::Course(id) => write!(f, "course {}", id),
            Entity::Enrollment {
                student_id,
                course_id,
            } => write!(
                f,
                "enrollment of student {} in course {}",
                student_id, course_id
            ),
        }
    }
}

/// Registry error type
#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    /// Failed to open, read or write the registry file
    #[error("failed to access registry file: {0}")]
    Io(#[from] std::io::Error),
    /// The delimited record layer rejected the input
    #[error("failed to process delimited record: {0}")]
    Csv(#[from] csv::Error),
    /// regex related error
    #[error("failed to parse or compile a regular expression: {0}")]
    Regex(#[from] regex::Error),
    /// A required field is missing or cannot be parsed
    #[error("malformed {field} on line {line}: {value:?}")]
    MalformedField {
        line: u64,
        field: &'static str,
        value: String,
    },
    /// Input ended before the section was complete
    #[error("unexpected end of {0} section")]
    UnexpectedEndOfSection(Section),
    /// An enrollment points at a course the registry does not hold
    #[error("enrollment of student {student_id} references unknown course {course_id}")]
    DanglingReference { student_id: u32, course_id: u32 },
    /// Lookup by id failed
    #[error("{0} not found")]
    NotFound(Entity),
    /// A course with this id is already registered
    #[error("course {0} already exists")]
    DuplicateCourse(u32),
    /// A student with this id is already registered
    #[error("student {0} already exists")]
    DuplicateStudent(u32),
    /// Every student id up to `u32::MAX` has been handed out or loaded
    #[error("no student ids left to hand out")]
    StudentIdsExhausted,
    #[error("student {student_id} is already enrolled in course {course_id}")]
    AlreadyEnrolled { student_id: u32, course_id: u32 },
}

impl RegistryError {
    pub(crate) fn malformed(line: u64, field: &'static str, value: impl Into<String>) -> Self {
        RegistryError::MalformedField {
            line,
            field,
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = RegistryError::malformed(3, "postal code", "64a83");
        assert_eq!(err.to_string(), "malformed postal code on line 3: \"64a83\"");

        let err = RegistryError::NotFound(Entity::Enrollment {
            student_id: 100000,
            course_id: 7,
        });
        assert_eq!(
            err.to_string(),
            "enrollment of student 100000 in course 7 not found"
        );

        let err = RegistryError::UnexpectedEndOfSection(Section::Students);
        assert_eq!(err.to_string(), "unexpected end of student section");
    }
}
