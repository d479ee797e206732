use std::collections::BTreeMap;

use log::debug;
use time::Date;

mod course;
mod err;
mod persistence;
mod record;
mod student;

pub use course::{BlockSchedule, Course, CourseHeader, CourseKind, Major, Schedule, WeeklySchedule};
pub use err::{Entity, RegistryError, Section};
pub use persistence::{LoadReport, SkippedRecord};
pub use student::{Address, Enrollment, Student};

/// Id handed to the first student added to a fresh registry
pub const FIRST_STUDENT_ID: u32 = 100000;

/// In-memory registry of courses and students, both keyed by id.
///
/// Student ids come from a counter owned by the registry. The counter only
/// moves forward: clearing the registry does not reset it, and loading a file
/// raises it past the highest id that was loaded.
#[derive(Debug)]
pub struct Registry {
    courses: BTreeMap<u32, Course>,
    students: BTreeMap<u32, Student>,
    // None once u32::MAX is taken
    next_student_id: Option<u32>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            courses: BTreeMap::new(),
            students: BTreeMap::new(),
            next_student_id: Some(FIRST_STUDENT_ID),
        }
    }

    /// Drops all courses and students. The student id counter is kept.
    pub fn clear(&mut self) {
        self.courses.clear();
        self.students.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty() && self.students.is_empty()
    }

    pub fn course_exists(&self, course_id: u32) -> bool {
        self.courses.contains_key(&course_id)
    }

    pub fn student_exists(&self, student_id: u32) -> bool {
        self.students.contains_key(&student_id)
    }

    pub fn course(&self, course_id: u32) -> Option<&Course> {
        self.courses.get(&course_id)
    }

    pub fn student(&self, student_id: u32) -> Option<&Student> {
        self.students.get(&student_id)
    }

    /// Courses in ascending id order
    pub fn courses(&self) -> impl Iterator<Item = &Course> {
        self.courses.values()
    }

    /// Students in ascending id order
    pub fn students(&self) -> impl Iterator<Item = &Student> {
        self.students.values()
    }

    pub fn enrollment_count(&self) -> usize {
        self.students.values().map(|s| s.enrollments().len()).sum()
    }

    /// Students whose "first last" name contains `query`
    pub fn search_students(&self, query: &str) -> Vec<&Student> {
        self.students
            .values()
            .filter(|s| s.full_name().contains(query))
            .collect()
    }

    pub fn add_block_course(
        &mut self,
        course_id: u32,
        major: Major,
        title: String,
        credit_points: f32,
        schedule: BlockSchedule,
    ) -> Result<(), RegistryError> {
        self.add_course(Course::new(
            course_id,
            title,
            major,
            credit_points,
            Schedule::Block(schedule),
        ))
    }

    pub fn add_weekly_course(
        &mut self,
        course_id: u32,
        major: Major,
        title: String,
        credit_points: f32,
        schedule: WeeklySchedule,
    ) -> Result<(), RegistryError> {
        self.add_course(Course::new(
            course_id,
            title,
            major,
            credit_points,
            Schedule::Weekly(schedule),
        ))
    }

    /// Inserts a course under its own id. An id that is already taken keeps
    /// its existing course.
    pub fn add_course(&mut self, course: Course) -> Result<(), RegistryError> {
        let course_id = course.id();
        if self.course_exists(course_id) {
            return Err(RegistryError::DuplicateCourse(course_id));
        }
        debug!("adding course {} ({})", course_id, course.title());
        self.courses.insert(course_id, course);
        Ok(())
    }

    /// Creates a student under the next free id and returns that id
    pub fn add_student(
        &mut self,
        first_name: String,
        last_name: String,
        date_of_birth: Date,
        address: Address,
    ) -> Result<u32, RegistryError> {
        let student_id = self
            .next_student_id
            .ok_or(RegistryError::StudentIdsExhausted)?;
        self.next_student_id = student_id.checked_add(1);
        debug!("adding student {}", student_id);
        self.students.insert(
            student_id,
            Student::new(student_id, first_name, last_name, date_of_birth, address),
        );
        Ok(student_id)
    }

    /// Inserts a student that already carries an id, as read from a file
    fn insert_student(&mut self, student: Student) -> Result<(), RegistryError> {
        let student_id = student.id();
        if self.student_exists(student_id) {
            return Err(RegistryError::DuplicateStudent(student_id));
        }
        self.next_student_id = match (self.next_student_id, student_id.checked_add(1)) {
            (Some(next), Some(after_loaded)) => Some(next.max(after_loaded)),
            _ => None,
        };
        self.students.insert(student_id, student);
        Ok(())
    }

    /// Enrolls a student in a course for `semester`, ungraded
    pub fn add_enrollment(
        &mut self,
        student_id: u32,
        course_id: u32,
        semester: String,
    ) -> Result<(), RegistryError> {
        self.attach_enrollment(student_id, Enrollment::new(course_id, semester))
    }

    fn attach_enrollment(
        &mut self,
        student_id: u32,
        enrollment: Enrollment,
    ) -> Result<(), RegistryError> {
        let course_id = enrollment.course_id;
        if !self.course_exists(course_id) {
            if !self.student_exists(student_id) {
                return Err(RegistryError::NotFound(Entity::Student(student_id)));
            }
            return Err(RegistryError::DanglingReference {
                student_id,
                course_id,
            });
        }
        let student = self.student_mut(student_id)?;
        if student.is_enrolled(course_id) {
            return Err(RegistryError::AlreadyEnrolled {
                student_id,
                course_id,
            });
        }
        student.enroll(enrollment);
        Ok(())
    }

    pub fn update_name(
        &mut self,
        student_id: u32,
        first_name: String,
        last_name: String,
    ) -> Result<(), RegistryError> {
        self.student_mut(student_id)?.set_name(first_name, last_name);
        Ok(())
    }

    pub fn update_date_of_birth(
        &mut self,
        student_id: u32,
        date_of_birth: Date,
    ) -> Result<(), RegistryError> {
        self.student_mut(student_id)?
            .set_date_of_birth(date_of_birth);
        Ok(())
    }

    /// Replaces the student's address as a whole
    pub fn update_address(&mut self, student_id: u32, address: Address) -> Result<(), RegistryError> {
        self.student_mut(student_id)?.set_address(address);
        Ok(())
    }

    pub fn update_grade(
        &mut self,
        student_id: u32,
        course_id: u32,
        grade: f32,
    ) -> Result<(), RegistryError> {
        if self.student_mut(student_id)?.update_grade(course_id, grade) {
            Ok(())
        } else {
            Err(RegistryError::NotFound(Entity::Enrollment {
                student_id,
                course_id,
            }))
        }
    }

    /// Removes the student's enrollment in `course_id`. Returns false when
    /// there was nothing to remove.
    pub fn delete_enrollment(
        &mut self,
        student_id: u32,
        course_id: u32,
    ) -> Result<bool, RegistryError> {
        Ok(self.student_mut(student_id)?.delete_enrollment(course_id))
    }

    fn student_mut(&mut self, student_id: u32) -> Result<&mut Student, RegistryError> {
        self.students
            .get_mut(&student_id)
            .ok_or(RegistryError::NotFound(Entity::Student(student_id)))
    }
}
