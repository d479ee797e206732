use time::Date;

use super::{
    err::RegistryError,
    record::{format_date, Fields},
};

/// Postal address of a student
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    street: String,
    postal_code: u16,
    city: String,
    // empty when there is no note
    note: String,
}

impl Address {
    pub fn new(street: String, postal_code: u16, city: String, note: String) -> Self {
        Self {
            street,
            postal_code,
            city,
            note,
        }
    }

    pub fn street(&self) -> &str {
        &self.street
    }

    pub fn postal_code(&self) -> u16 {
        self.postal_code
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn note(&self) -> Option<&str> {
        if self.note.is_empty() {
            None
        } else {
            Some(&self.note)
        }
    }

    /// Appends `street;postalCode;city;note`; the note field is always
    /// present, empty when there is no note
    pub fn write(&self, out: &mut Vec<String>) {
        out.push(self.street.clone());
        out.push(self.postal_code.to_string());
        out.push(self.city.clone());
        out.push(self.note.clone());
    }

    /// The note is the last field of its line and takes whatever is left on it
    pub fn read(fields: &mut Fields<'_>) -> Result<Self, RegistryError> {
        let street = fields.text("street")?.to_string();
        let postal_code = fields.parse("postal code")?;
        let city = fields.text("city")?.to_string();
        let note = fields.rest("address note")?;
        Ok(Self::new(street, postal_code, city, note))
    }
}

/// A student's enrollment in one course.
///
/// The course is referenced by id and resolved through the registry.
/// A grade of 0.0 is both the initial value and a grade of zero; the file
/// format cannot tell the two apart.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrollment {
    pub course_id: u32,
    pub semester: String,
    pub grade: f32,
}

impl Enrollment {
    pub fn new(course_id: u32, semester: String) -> Self {
        Self {
            course_id,
            semester,
            grade: 0.0,
        }
    }

    /// Appends `courseId;semester;grade` with the grade to one decimal place
    pub fn write(&self, out: &mut Vec<String>) {
        out.push(self.course_id.to_string());
        out.push(self.semester.clone());
        out.push(format!("{:.1}", self.grade));
    }

    /// Reads `semester;grade`. The course id in front of them belongs to the
    /// caller, who has already consumed it.
    pub fn read(course_id: u32, fields: &mut Fields<'_>) -> Result<Self, RegistryError> {
        let semester = fields.text("semester")?.to_string();
        let grade = fields.parse("grade")?;
        Ok(Self {
            course_id,
            semester,
            grade,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    id: u32,
    first_name: String,
    last_name: String,
    date_of_birth: Date,
    address: Address,
    enrollments: Vec<Enrollment>,
}

impl Student {
    pub fn new(
        id: u32,
        first_name: String,
        last_name: String,
        date_of_birth: Date,
        address: Address,
    ) -> Self {
        Self {
            id,
            first_name,
            last_name,
            date_of_birth,
            address,
            enrollments: vec![],
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn date_of_birth(&self) -> Date {
        self.date_of_birth
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Enrollments in the order they were made
    pub fn enrollments(&self) -> &[Enrollment] {
        &self.enrollments
    }

    pub fn enrollment(&self, course_id: u32) -> Option<&Enrollment> {
        self.enrollments.iter().find(|e| e.course_id == course_id)
    }

    pub fn is_enrolled(&self, course_id: u32) -> bool {
        self.enrollment(course_id).is_some()
    }

    pub fn set_name(&mut self, first_name: String, last_name: String) {
        self.first_name = first_name;
        self.last_name = last_name;
    }

    pub fn set_date_of_birth(&mut self, date_of_birth: Date) {
        self.date_of_birth = date_of_birth;
    }

    pub fn set_address(&mut self, address: Address) {
        self.address = address;
    }

    pub fn enroll(&mut self, enrollment: Enrollment) {
        self.enrollments.push(enrollment);
    }

    /// Grades the first enrollment in `course_id`; false if there is none
    pub fn update_grade(&mut self, course_id: u32, grade: f32) -> bool {
        match self.enrollments.iter_mut().find(|e| e.course_id == course_id) {
            Some(enrollment) => {
                enrollment.grade = grade;
                true
            }
            None => false,
        }
    }

    /// Removes the first enrollment in `course_id`; false if there is none
    pub fn delete_enrollment(&mut self, course_id: u32) -> bool {
        match self.enrollments.iter().position(|e| e.course_id == course_id) {
            Some(index) => {
                self.enrollments.remove(index);
                true
            }
            None => false,
        }
    }

    /// Appends `firstName;lastName;dob;<address>`. The id is written by the
    /// registry in front of these fields.
    pub fn write(&self, out: &mut Vec<String>) {
        out.push(self.first_name.clone());
        out.push(self.last_name.clone());
        out.push(format_date(self.date_of_birth));
        self.address.write(out);
    }

    /// Reads the fields written by [`Student::write`] for a student whose id
    /// has already been read
    pub fn read(id: u32, fields: &mut Fields<'_>) -> Result<Self, RegistryError> {
        let first_name = fields.text("first name")?.to_string();
        let last_name = fields.text("last name")?.to_string();
        let date_of_birth = fields.date("date of birth")?;
        let address = Address::read(fields)?;
        Ok(Self::new(id, first_name, last_name, date_of_birth, address))
    }
}
