use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use log::warn;
use time::{Date, Time, Weekday};

use super::{
    err::RegistryError,
    record::{format_date, format_time, Fields},
};

/// Major a course belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Major {
    Automation,
    Communication,
    Embedded,
    General,
    Power,
}

impl Major {
    /// Major-to-code mapping; the code is what the registry keeps internally
    const TABLE: [(Self, char, &'static str); 5] = [
        (Self::Automation, 'A', "Automation"),
        (Self::Communication, 'C', "Communication"),
        (Self::Embedded, 'E', "Embedded"),
        (Self::General, 'G', "General"),
        (Self::Power, 'P', "Power"),
    ];

    pub fn all() -> [Self; 5] {
        Self::TABLE.map(|(major, _, _)| major)
    }

    pub fn code(self) -> char {
        self.entry().1
    }

    pub fn name(self) -> &'static str {
        self.entry().2
    }

    pub fn from_code(code: char) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(major, _, _)| *major)
    }

    fn entry(self) -> (Self, char, &'static str) {
        Self::TABLE[self as usize]
    }
}

impl FromStr for Major {
    type Err = ();

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::TABLE
            .iter()
            .find(|(_, _, n)| *n == name)
            .map(|(major, _, _)| *major)
            .ok_or(())
    }
}

impl Display for Major {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

/// Discriminant of the schedule variants, written as the leading tag of a course record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseKind {
    Block,
    Weekly,
}

impl CourseKind {
    pub fn tag(self) -> &'static str {
        match self {
            CourseKind::Block => "B",
            CourseKind::Weekly => "W",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "B" => Some(CourseKind::Block),
            "W" => Some(CourseKind::Weekly),
            _ => None,
        }
    }
}

/// Course held on consecutive days between two dates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSchedule {
    pub start_date: Date,
    pub end_date: Date,
    pub start_time: Time,
    pub end_time: Time,
}

/// Course held once a week
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklySchedule {
    pub day: Weekday,
    pub start_time: Time,
    pub end_time: Time,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Block(BlockSchedule),
    Weekly(WeeklySchedule),
}

impl Schedule {
    pub fn kind(&self) -> CourseKind {
        match self {
            Schedule::Block(_) => CourseKind::Block,
            Schedule::Weekly(_) => CourseKind::Weekly,
        }
    }
}

/// Fields shared by every course variant
#[derive(Debug, Clone, PartialEq)]
pub struct CourseHeader {
    pub id: u32,
    pub title: String,
    /// `None` when the stored major name was not recognised
    pub major: Option<Major>,
    pub credit_points: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    pub header: CourseHeader,
    pub schedule: Schedule,
}

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Sunday,
    Weekday::Monday,
    Weekday::Tuesday,
    Weekday::Wednesday,
    Weekday::Thursday,
    Weekday::Friday,
    Weekday::Saturday,
];

/// Sunday is 0, Saturday is 6
pub fn weekday_from_ordinal(ordinal: u8) -> Option<Weekday> {
    WEEKDAYS.get(usize::from(ordinal)).copied()
}

impl Course {
    pub fn new(
        id: u32,
        title: String,
        major: Major,
        credit_points: f32,
        schedule: Schedule,
    ) -> Self {
        Self {
            header: CourseHeader {
                id,
                title,
                major: Some(major),
                credit_points,
            },
            schedule,
        }
    }

    pub fn id(&self) -> u32 {
        self.header.id
    }

    pub fn title(&self) -> &str {
        &self.header.title
    }

    pub fn kind(&self) -> CourseKind {
        self.schedule.kind()
    }

    /// Appends `tag;id;title;major;credits;<schedule fields>`
    pub fn write(&self, out: &mut Vec<String>) {
        let header = &self.header;
        out.push(self.kind().tag().to_string());
        out.push(header.id.to_string());
        out.push(header.title.clone());
        out.push(header.major.map(Major::name).unwrap_or_default().to_string());
        out.push(header.credit_points.to_string());
        match &self.schedule {
            Schedule::Block(block) => {
                out.push(format_date(block.start_date));
                out.push(format_date(block.end_date));
                out.push(format_time(block.start_time));
                out.push(format_time(block.end_time));
            }
            Schedule::Weekly(weekly) => {
                out.push(weekly.day.number_days_from_sunday().to_string());
                out.push(format_time(weekly.start_time));
                out.push(format_time(weekly.end_time));
            }
        }
    }

    /// Reads one course record.
    ///
    /// Returns `Ok(None)` when the leading tag is neither `B` nor `W`; nothing
    /// past the tag is inspected in that case.
    pub fn read(fields: &mut Fields<'_>) -> Result<Option<Course>, RegistryError> {
        let kind = match CourseKind::from_tag(fields.text("course type")?) {
            Some(kind) => kind,
            None => return Ok(None),
        };
        let header = read_header(fields)?;
        let schedule = match kind {
            CourseKind::Block => Schedule::Block(BlockSchedule {
                start_date: fields.date("start date")?,
                end_date: fields.date("end date")?,
                start_time: fields.time("start time")?,
                end_time: fields.time("end time")?,
            }),
            CourseKind::Weekly => {
                let line = fields.line();
                let ordinal = fields.text("day of week")?;
                let day = ordinal
                    .trim()
                    .parse()
                    .ok()
                    .and_then(weekday_from_ordinal)
                    .ok_or_else(|| RegistryError::malformed(line, "day of week", ordinal))?;
                Schedule::Weekly(WeeklySchedule {
                    day,
                    start_time: fields.time("start time")?,
                    end_time: fields.time("end time")?,
                })
            }
        };
        Ok(Some(Course { header, schedule }))
    }
}

fn read_header(fields: &mut Fields<'_>) -> Result<CourseHeader, RegistryError> {
    let id = fields.parse("course id")?;
    let title = fields.text("title")?.to_string();
    let major_name = fields.text("major")?;
    let major = major_name.parse().ok();
    if major.is_none() {
        warn!(
            "course {} on line {} has unknown major {:?}, leaving it unset",
            id,
            fields.line(),
            major_name
        );
    }
    let credit_points = fields.parse("credit points")?;
    Ok(CourseHeader {
        id,
        title,
        major,
        credit_points,
    })
}
