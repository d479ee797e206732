//! Whole-registry file format.
//!
//! ```text
//! <courseCount>
//! B;id;title;major;credits;startDate;endDate;startTime;endTime
//! W;id;title;major;credits;dayOfWeek;startTime;endTime
//! <studentCount>
//! studentId;firstName;lastName;dateOfBirth;street;postalCode;city;note
//! <enrollmentCount>
//! studentId;courseId;semester;grade
//! ```

use std::{
    fs::File,
    io::{self, BufWriter},
    path::Path,
};

use log::{info, warn};
use serde::{Serialize, Serializer};

use super::{
    course::Course,
    err::{RegistryError, Section},
    record::{Fields, RecordReader, RecordWriter},
    student::{Enrollment, Student},
    Registry,
};

/// Outcome of a load that did not fail outright
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub courses: usize,
    pub students: usize,
    pub enrollments: usize,
    /// The file started with student records, so its leading count was taken
    /// as the student count and the enrollment section was not read
    pub course_section_missing: bool,
    /// Records that were read but not applied
    pub skipped: Vec<SkippedRecord>,
}

impl LoadReport {
    /// True when every record read was applied
    pub fn is_success(&self) -> bool {
        self.skipped.is_empty()
    }

    fn skip(&mut self, section: Section, line: u64, error: RegistryError) {
        warn!("skipping {} record on line {}: {}", section, line, error);
        self.skipped.push(SkippedRecord {
            section,
            line,
            error,
        });
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRecord {
    pub section: Section,
    pub line: u64,
    #[serde(serialize_with = "serialize_error")]
    pub error: RegistryError,
}

fn serialize_error<S: Serializer>(error: &RegistryError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

impl Registry {
    /// Writes courses, students and enrollments as three counted sections,
    /// each in ascending id order
    pub fn write<W: io::Write>(&self, wtr: W) -> Result<(), RegistryError> {
        let mut writer = RecordWriter::new(wtr);
        let mut fields = Vec::new();

        writer.write_count(self.courses.len())?;
        for course in self.courses.values() {
            fields.clear();
            course.write(&mut fields);
            writer.write_fields(&fields)?;
        }

        writer.write_count(self.students.len())?;
        for student in self.students.values() {
            fields.clear();
            fields.push(student.id().to_string());
            student.write(&mut fields);
            writer.write_fields(&fields)?;
        }

        writer.write_count(self.enrollment_count())?;
        for student in self.students.values() {
            for enrollment in student.enrollments() {
                fields.clear();
                fields.push(student.id().to_string());
                enrollment.write(&mut fields);
                writer.write_fields(&fields)?;
            }
        }

        writer.finish()
    }

    /// Replaces the registry's contents with what `rdr` holds.
    ///
    /// The registry is cleared before anything is read. On error it is left
    /// empty; there is no way back to the previous contents. Students keep the
    /// ids they were saved with.
    pub fn read<R: io::Read>(&mut self, rdr: R) -> Result<LoadReport, RegistryError> {
        self.clear();
        let mut reader = RecordReader::new(rdr)?;
        match self.read_sections(&mut reader) {
            Ok(report) => Ok(report),
            Err(err) => {
                self.clear();
                Err(err)
            }
        }
    }

    fn read_sections(&mut self, reader: &mut RecordReader) -> Result<LoadReport, RegistryError> {
        let mut report = LoadReport::default();

        let course_count = reader.read_count(Section::Courses)?;
        for _ in 0..course_count {
            let record = reader.expect_record(Section::Courses)?;
            let mut fields = Fields::new(&record);
            let line = fields.line();
            let course = match Course::read(&mut fields)? {
                Some(course) => course,
                None => {
                    warn!(
                        "line {} is not a course record, reading the leading count as the student count",
                        line
                    );
                    reader.unread(record);
                    report.course_section_missing = true;
                    break;
                }
            };
            fields.finish()?;
            match self.add_course(course) {
                Ok(()) => report.courses += 1,
                Err(err) => report.skip(Section::Courses, line, err),
            }
        }

        let student_count = if report.course_section_missing {
            course_count
        } else {
            reader.read_count(Section::Students)?
        };
        for index in 0..student_count {
            let record = reader.expect_record(Section::Students)?;
            let mut fields = Fields::new(&record);
            let line = fields.line();
            let student_id = match fields.parse("student id") {
                Ok(student_id) => student_id,
                Err(err) => {
                    if index == 0 {
                        warn!("line {} does not hold student data", line);
                    }
                    return Err(err);
                }
            };
            let student = Student::read(student_id, &mut fields)?;
            fields.finish()?;
            match self.insert_student(student) {
                Ok(()) => report.students += 1,
                Err(err) => report.skip(Section::Students, line, err),
            }
        }

        if student_count > 0 && !report.course_section_missing {
            let enrollment_count = reader.read_count(Section::Enrollments)?;
            for _ in 0..enrollment_count {
                let record = reader.expect_record(Section::Enrollments)?;
                let mut fields = Fields::new(&record);
                let line = fields.line();
                let student_id = fields.parse("student id")?;
                let course_id = fields.parse("course id")?;
                let enrollment = Enrollment::read(course_id, &mut fields)?;
                fields.finish()?;
                match self.attach_enrollment(student_id, enrollment) {
                    Ok(()) => report.enrollments += 1,
                    Err(err) => report.skip(Section::Enrollments, line, err),
                }
            }
        }

        Ok(report)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), RegistryError> {
        let path = path.as_ref();
        let file = File::create(path)?;
        self.write(BufWriter::new(file))?;
        info!(
            "saved {} courses, {} students and {} enrollments to {}",
            self.courses.len(),
            self.students.len(),
            self.enrollment_count(),
            path.display()
        );
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<LoadReport, RegistryError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let report = self.read(file)?;
        info!(
            "loaded {} courses, {} students and {} enrollments from {} ({} skipped)",
            report.courses,
            report.students,
            report.enrollments,
            path.display(),
            report.skipped.len()
        );
        Ok(report)
    }
}
