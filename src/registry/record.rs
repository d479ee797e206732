use std::{io, str::FromStr};

use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use once_cell::sync::OnceCell;
use regex::Regex;
use time::{Date, Month, Time};

use super::err::{RegistryError, Section};

/// Field separator of the registry file
pub const DELIMITER: u8 = b';';

/// Reads `;`-separated records one line at a time.
///
/// A record can be handed back with [`RecordReader::unread`], which is how the
/// loader peeks at the first course record without consuming it.
///
/// The input is buffered whole so that each record can be checked against its
/// raw text: the csv layer would otherwise turn a stray quote at the start of a
/// legacy free-text field into quoting and drop it.
pub struct RecordReader {
    inner: csv::Reader<io::Cursor<Vec<u8>>>,
    pending: Option<StringRecord>,
}

impl RecordReader {
    pub fn new<R: io::Read>(mut rdr: R) -> Result<Self, RegistryError> {
        let mut data = Vec::new();
        rdr.read_to_end(&mut data)?;
        let inner = ReaderBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(false)
            .flexible(true)
            .from_reader(io::Cursor::new(data));
        Ok(Self {
            inner,
            pending: None,
        })
    }

    pub fn next_record(&mut self) -> Result<Option<StringRecord>, RegistryError> {
        if let Some(record) = self.pending.take() {
            return Ok(Some(record));
        }
        let mut record = StringRecord::new();
        if !self.inner.read_record(&mut record)? {
            return Ok(None);
        }
        let (start, line) = record
            .position()
            .map_or((0, 0), |pos| (pos.byte(), pos.line()));
        let end = self.inner.position().byte();
        let raw = self
            .inner
            .get_ref()
            .get_ref()
            .get(start as usize..end as usize)
            .unwrap_or_default();
        check_quotes(raw, line)?;
        Ok(Some(record))
    }

    pub fn unread(&mut self, record: StringRecord) {
        self.pending = Some(record);
    }

    /// Next record of `section`, failing if the input is exhausted
    pub fn expect_record(&mut self, section: Section) -> Result<StringRecord, RegistryError> {
        self.next_record()?
            .ok_or(RegistryError::UnexpectedEndOfSection(section))
    }

    /// Reads the single-field line that prefixes a section
    pub fn read_count(&mut self, section: Section) -> Result<usize, RegistryError> {
        let record = self.expect_record(section)?;
        let field = match section {
            Section::Courses => "course count",
            Section::Students => "student count",
            Section::Enrollments => "enrollment count",
        };
        let mut fields = Fields::new(&record);
        let count = fields.parse(field)?;
        fields.finish()?;
        Ok(count)
    }
}

/// Every field of `raw` that opens with a quote must close with one right
/// before the next delimiter or the end of the record
fn check_quotes(raw: &[u8], line: u64) -> Result<(), RegistryError> {
    let is_break = |b: &u8| *b == b'\r' || *b == b'\n';
    let first = raw.iter().position(|b| !is_break(b)).unwrap_or(raw.len());
    let last = raw.iter().rposition(|b| !is_break(b)).map_or(first, |i| i + 1);
    let raw = &raw[first..last.max(first)];

    let field_end = |from: usize| {
        raw[from..]
            .iter()
            .position(|&b| b == DELIMITER)
            .map_or(raw.len(), |i| from + i)
    };
    let unbalanced =
        |field: &[u8]| RegistryError::malformed(line, "quoted field", String::from_utf8_lossy(field));

    let mut pos = 0;
    while pos <= raw.len() {
        let start = pos;
        if raw.get(pos) == Some(&b'"') {
            pos += 1;
            loop {
                match raw.get(pos) {
                    Some(b'"') if raw.get(pos + 1) == Some(&b'"') => pos += 2,
                    Some(b'"') => {
                        pos += 1;
                        break;
                    }
                    Some(_) => pos += 1,
                    None => return Err(unbalanced(&raw[start..])),
                }
            }
            if pos < raw.len() && raw[pos] != DELIMITER {
                return Err(unbalanced(&raw[start..field_end(pos)]));
            }
        } else {
            pos = field_end(pos);
        }
        // past the delimiter
        pos += 1;
    }
    Ok(())
}

/// Writes `;`-separated records.
///
/// Fields that contain the delimiter, a double quote or a line break are
/// quoted; everything else is written bare.
pub struct RecordWriter<W: io::Write> {
    inner: csv::Writer<W>,
}

impl<W: io::Write> RecordWriter<W> {
    pub fn new(wtr: W) -> Self {
        let inner = WriterBuilder::new()
            .delimiter(DELIMITER)
            .flexible(true)
            .quote_style(QuoteStyle::Necessary)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(wtr);
        Self { inner }
    }

    pub fn write_count(&mut self, count: usize) -> Result<(), RegistryError> {
        self.inner.write_record([count.to_string()])?;
        Ok(())
    }

    pub fn write_fields(&mut self, fields: &[String]) -> Result<(), RegistryError> {
        self.inner.write_record(fields)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<(), RegistryError> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Cursor over the fields of one record
pub struct Fields<'r> {
    record: &'r StringRecord,
    line: u64,
    next: usize,
}

impl<'r> Fields<'r> {
    pub fn new(record: &'r StringRecord) -> Self {
        let line = record.position().map_or(0, |pos| pos.line());
        Self {
            record,
            line,
            next: 0,
        }
    }

    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn text(&mut self, field: &'static str) -> Result<&'r str, RegistryError> {
        let value = self
            .record
            .get(self.next)
            .ok_or_else(|| RegistryError::malformed(self.line, field, ""))?;
        self.next += 1;
        Ok(value)
    }

    pub fn parse<T: FromStr>(&mut self, field: &'static str) -> Result<T, RegistryError> {
        let value = self.text(field)?;
        value
            .trim()
            .parse()
            .map_err(|_| RegistryError::malformed(self.line, field, value))
    }

    pub fn date(&mut self, field: &'static str) -> Result<Date, RegistryError> {
        let value = self.text(field)?;
        parse_date(value)?.ok_or_else(|| RegistryError::malformed(self.line, field, value))
    }

    pub fn time(&mut self, field: &'static str) -> Result<Time, RegistryError> {
        let value = self.text(field)?;
        parse_time(value)?.ok_or_else(|| RegistryError::malformed(self.line, field, value))
    }

    /// Everything left on the line, rejoined with the delimiter
    pub fn rest(&mut self, field: &'static str) -> Result<String, RegistryError> {
        if self.next >= self.record.len() {
            return Err(RegistryError::malformed(self.line, field, ""));
        }
        let rest: Vec<&str> = self.record.iter().skip(self.next).collect();
        self.next = self.record.len();
        Ok(rest.join(";"))
    }

    /// Fails if the record carries fields nobody consumed
    pub fn finish(self) -> Result<(), RegistryError> {
        match self.record.get(self.next) {
            Some(surplus) => Err(RegistryError::malformed(
                self.line,
                "trailing field",
                surplus,
            )),
            None => Ok(()),
        }
    }
}

type Pattern = OnceCell<Result<Regex, regex::Error>>;

static DATE_PATTERN: Pattern = OnceCell::new();
static TIME_PATTERN: Pattern = OnceCell::new();

/// Compiles `pattern` on first use and hands out the cached regex afterwards
fn compiled(cell: &'static Pattern, pattern: &str) -> Result<&'static Regex, RegistryError> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|err| RegistryError::Regex(err.clone()))
}

/// Parses `D.M.YYYY`; day and month may be zero-padded
pub fn parse_date(value: &str) -> Result<Option<Date>, RegistryError> {
    let re = compiled(&DATE_PATTERN, r"^(\d{1,2})\.(\d{1,2})\.(\d{1,4})$")?;
    let date = re.captures(value.trim()).and_then(|captures| {
        let month = Month::try_from(captures[2].parse::<u8>().ok()?).ok()?;
        let year = captures[3].parse().ok()?;
        let day = captures[1].parse().ok()?;
        Date::from_calendar_date(year, month, day).ok()
    });
    Ok(date)
}

/// Parses `HH:MM`
pub fn parse_time(value: &str) -> Result<Option<Time>, RegistryError> {
    let re = compiled(&TIME_PATTERN, r"^(\d{1,2}):(\d{1,2})$")?;
    let time = re.captures(value.trim()).and_then(|captures| {
        let hour = captures[1].parse().ok()?;
        let minute = captures[2].parse().ok()?;
        Time::from_hms(hour, minute, 0).ok()
    });
    Ok(time)
}

pub fn format_date(date: Date) -> String {
    format!("{}.{}.{}", date.day(), u8::from(date.month()), date.year())
}

pub fn format_time(time: Time) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn ymd(year: i32, month: Month, day: u8) -> Date {
        Date::from_calendar_date(year, month, day).unwrap()
    }

    fn read_all(input: &str) -> Vec<StringRecord> {
        let mut reader = RecordReader::new(input.as_bytes()).unwrap();
        let mut records = vec![];
        while let Some(record) = reader.next_record().unwrap() {
            records.push(record);
        }
        records
    }

    #[test]
    fn test_parse_date() -> Result<(), Box<dyn Error>> {
        let date = parse_date("1.3.2024")?.unwrap();
        assert_eq!(date, ymd(2024, Month::March, 1));
        let date = parse_date("10.12.1990")?.unwrap();
        assert_eq!(date, ymd(1990, Month::December, 10));
        assert_eq!(parse_date("01.06.2024")?, Some(ymd(2024, Month::June, 1)));

        assert_eq!(parse_date("31.2.2024")?, None);
        assert_eq!(parse_date("1-3-2024")?, None);
        assert_eq!(parse_date("")?, None);
        Ok(())
    }

    #[test]
    fn test_parse_time() -> Result<(), Box<dyn Error>> {
        assert_eq!(parse_time("09:00")?, Some(Time::from_hms(9, 0, 0)?));
        assert_eq!(parse_time("9:5")?, Some(Time::from_hms(9, 5, 0)?));
        assert_eq!(parse_time("24:00")?, None);
        assert_eq!(parse_time("nine")?, None);
        Ok(())
    }

    #[test]
    fn test_format_date_and_time() -> Result<(), Box<dyn Error>> {
        assert_eq!(format_date(ymd(2024, Month::March, 1)), "1.3.2024");
        assert_eq!(format_time(Time::from_hms(9, 5, 0)?), "09:05");
        Ok(())
    }

    #[test]
    fn test_fields_report_line_and_field() {
        let records = read_all("3\nB;abc\n");
        let mut fields = Fields::new(&records[1]);
        assert_eq!(fields.line(), 2);
        assert_eq!(fields.text("tag").unwrap(), "B");
        match fields.parse::<u32>("course id") {
            Err(RegistryError::MalformedField { line, field, value }) => {
                assert_eq!(line, 2);
                assert_eq!(field, "course id");
                assert_eq!(value, "abc");
            }
            other => panic!("expected a malformed field, got {:?}", other),
        }
        assert!(matches!(
            fields.text("title"),
            Err(RegistryError::MalformedField { field: "title", .. })
        ));
    }

    #[test]
    fn test_fields_rest_and_finish() {
        let records = read_all("a;b;c;d\n");
        let mut fields = Fields::new(&records[0]);
        fields.text("first").unwrap();
        assert_eq!(fields.rest("note").unwrap(), "b;c;d");
        assert!(fields.finish().is_ok());

        let mut fields = Fields::new(&records[0]);
        fields.text("first").unwrap();
        assert!(matches!(
            fields.finish(),
            Err(RegistryError::MalformedField { field: "trailing field", .. })
        ));
    }

    #[test]
    fn test_read_count() {
        let mut reader = RecordReader::new("2\nx\n1;2\n".as_bytes()).unwrap();
        assert_eq!(reader.read_count(Section::Courses).unwrap(), 2);
        assert!(matches!(
            reader.read_count(Section::Students),
            Err(RegistryError::MalformedField { field: "student count", .. })
        ));
        assert!(matches!(
            reader.read_count(Section::Students),
            Err(RegistryError::MalformedField { field: "trailing field", .. })
        ));
        assert!(matches!(
            reader.read_count(Section::Enrollments),
            Err(RegistryError::UnexpectedEndOfSection(Section::Enrollments))
        ));
    }

    #[test]
    fn test_unread_returns_same_record() {
        let mut reader = RecordReader::new("first\nsecond\n".as_bytes()).unwrap();
        let record = reader.next_record().unwrap().unwrap();
        reader.unread(record);
        assert_eq!(&reader.next_record().unwrap().unwrap()[0], "first");
        assert_eq!(&reader.next_record().unwrap().unwrap()[0], "second");
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_writer_quotes_only_when_needed() {
        let mut buf = vec![];
        let mut writer = RecordWriter::new(&mut buf);
        writer.write_count(1).unwrap();
        writer
            .write_fields(&[
                "Main St 1".to_string(),
                "Rock; Roll".to_string(),
                "say \"hi\"".to_string(),
                String::new(),
            ])
            .unwrap();
        writer.finish().unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "1\nMain St 1;\"Rock; Roll\";\"say \"\"hi\"\"\";\n");

        let records = read_all(&text);
        assert_eq!(records[1].len(), 4);
        assert_eq!(&records[1][1], "Rock; Roll");
        assert_eq!(&records[1][2], "say \"hi\"");
        assert_eq!(&records[1][3], "");
    }

    #[test]
    fn test_stray_quote_in_unquoted_text_is_rejected() {
        let mut reader = RecordReader::new("1\nB;1;\"Smart\" Grids;Power\n".as_bytes()).unwrap();
        assert_eq!(&reader.next_record().unwrap().unwrap()[0], "1");
        match reader.next_record() {
            Err(RegistryError::MalformedField { line, field, value }) => {
                assert_eq!(line, 2);
                assert_eq!(field, "quoted field");
                assert_eq!(value, "\"Smart\" Grids");
            }
            other => panic!("expected a malformed field, got {:?}", other),
        }
    }

    #[test]
    fn test_check_quotes() {
        assert!(check_quotes(b"a;\"Rock; Roll\";\"say \"\"hi\"\"\";\n", 1).is_ok());
        assert!(check_quotes(b"\"multi\nline\"\r\n", 1).is_ok());
        assert!(check_quotes(b"a;say \"hi\";b", 1).is_ok());
        assert!(check_quotes(b"a;;", 1).is_ok());

        assert!(check_quotes(b"a;\"Smart\" Grids;b", 1).is_err());
        assert!(check_quotes(b"a;\"open", 1).is_err());
    }
}
