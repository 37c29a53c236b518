use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const SEMESTER_COUNT: usize = 2;
pub const MONTHS_PER_SEMESTER: usize = 2;
pub const DEFAULT_YEAR: &str = "2025-2026";
pub const DEFAULT_EXAM_MAX_GRADE: i64 = 100;
/// Upper bound for the shared written-exam cap and for the single-shot
/// mid-year / final examinations.
pub const EXAM_CAP: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GradebookError {
    #[error("student {0} not found")]
    UnknownStudent(i64),
    #[error("semester index {0} out of range")]
    SemesterOutOfRange(usize),
    #[error("month index {0} out of range")]
    MonthOutOfRange(usize),
    #[error("column index {col} out of range (month has {len} columns)")]
    ColumnOutOfRange { col: usize, len: usize },
    #[error("column max must be >= 0, got {0}")]
    NegativeMax(i64),
    #[error("unrecognized grade key: {0}")]
    BadGradeKey(String),
    #[error("record {0} not found")]
    RecordNotFound(String),
    #[error("record {0} already exists")]
    DuplicateRecord(String),
    #[error("{0}")]
    InvalidInput(String),
}

impl GradebookError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownStudent(_) | Self::RecordNotFound(_) => "not_found",
            Self::DuplicateRecord(_) => "conflict",
            _ => "bad_params",
        }
    }
}

/// Address of one cell in a student's ledger.
///
/// The storage form is the string scheme `s{sem}-m{month}-c{col}`,
/// `s{sem}-m{month}-exam`, `midYear` and `finalExam`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GradeKey {
    Activity { sem: usize, month: usize, col: usize },
    MonthExam { sem: usize, month: usize },
    MidYear,
    FinalExam,
}

impl fmt::Display for GradeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activity { sem, month, col } => write!(f, "s{}-m{}-c{}", sem, month, col),
            Self::MonthExam { sem, month } => write!(f, "s{}-m{}-exam", sem, month),
            Self::MidYear => f.write_str("midYear"),
            Self::FinalExam => f.write_str("finalExam"),
        }
    }
}

impl FromStr for GradeKey {
    type Err = GradebookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || GradebookError::BadGradeKey(s.to_string());
        match s {
            "midYear" => return Ok(Self::MidYear),
            "finalExam" => return Ok(Self::FinalExam),
            _ => {}
        }

        let rest = s.strip_prefix('s').ok_or_else(bad)?;
        let mut parts = rest.splitn(3, '-');
        let sem: usize = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
        let month: usize = parts
            .next()
            .and_then(|p| p.strip_prefix('m'))
            .and_then(|p| p.parse().ok())
            .ok_or_else(bad)?;
        if sem >= SEMESTER_COUNT || month >= MONTHS_PER_SEMESTER {
            return Err(bad());
        }
        match parts.next() {
            Some("exam") => Ok(Self::MonthExam { sem, month }),
            Some(tail) => {
                let col: usize = tail
                    .strip_prefix('c')
                    .and_then(|p| p.parse().ok())
                    .ok_or_else(bad)?;
                Ok(Self::Activity { sem, month, col })
            }
            None => Err(bad()),
        }
    }
}

impl Serialize for GradeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GradeKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

pub type Grades = BTreeMap<GradeKey, Option<i64>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_grades")]
    pub grades: Grades,
}

impl Student {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            grades: Grades::new(),
        }
    }

    /// Entered value for `key`; `None` both when the key is absent and when
    /// it holds an explicit blank.
    pub fn grade(&self, key: GradeKey) -> Option<i64> {
        self.grades.get(&key).copied().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomColumn {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub max: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Month {
    #[serde(default, deserialize_with = "null_as_default")]
    pub custom_columns: Vec<CustomColumn>,
}

impl Month {
    pub fn daily_max(&self) -> i64 {
        self.custom_columns
            .iter()
            .fold(0i64, |acc, c| acc.saturating_add(c.max))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Semester {
    #[serde(default, deserialize_with = "pair_or_default")]
    pub months: [Month; MONTHS_PER_SEMESTER],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub school_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub teacher_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub subject_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub class_name: String,
    #[serde(deserialize_with = "year_or_default")]
    pub year: String,
    #[serde(deserialize_with = "exam_max_or_default")]
    pub exam_max_grade: i64,
}

impl Default for RecordInfo {
    fn default() -> Self {
        Self {
            school_name: String::new(),
            teacher_name: String::new(),
            subject_name: String::new(),
            class_name: String::new(),
            year: DEFAULT_YEAR.to_string(),
            exam_max_grade: DEFAULT_EXAM_MAX_GRADE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradebookState {
    #[serde(default, deserialize_with = "null_as_default")]
    pub info: RecordInfo,
    #[serde(default, deserialize_with = "null_as_default")]
    pub students: Vec<Student>,
    #[serde(default, deserialize_with = "pair_or_default")]
    pub semesters: [Semester; SEMESTER_COUNT],
}

impl GradebookState {
    /// Parses a stored record, defaulting every missing nested field.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn semester(&self, sem: usize) -> Result<&Semester, GradebookError> {
        self.semesters
            .get(sem)
            .ok_or(GradebookError::SemesterOutOfRange(sem))
    }

    pub fn month(&self, sem: usize, month: usize) -> Result<&Month, GradebookError> {
        self.semester(sem)?
            .months
            .get(month)
            .ok_or(GradebookError::MonthOutOfRange(month))
    }

    pub fn month_mut(&mut self, sem: usize, month: usize) -> Result<&mut Month, GradebookError> {
        self.semesters
            .get_mut(sem)
            .ok_or(GradebookError::SemesterOutOfRange(sem))?
            .months
            .get_mut(month)
            .ok_or(GradebookError::MonthOutOfRange(month))
    }

    pub fn student(&self, id: i64) -> Result<&Student, GradebookError> {
        self.students
            .iter()
            .find(|s| s.id == id)
            .ok_or(GradebookError::UnknownStudent(id))
    }

    pub fn student_mut(&mut self, id: i64) -> Result<&mut Student, GradebookError> {
        self.students
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(GradebookError::UnknownStudent(id))
    }

    /// Largest value the grid accepts for `key` at entry time.
    pub fn grade_cap(&self, key: GradeKey) -> Result<i64, GradebookError> {
        match key {
            GradeKey::Activity { sem, month, col } => {
                let m = self.month(sem, month)?;
                m.custom_columns
                    .get(col)
                    .map(|c| c.max)
                    .ok_or(GradebookError::ColumnOutOfRange {
                        col,
                        len: m.custom_columns.len(),
                    })
            }
            GradeKey::MonthExam { .. } => Ok(self.info.exam_max_grade),
            GradeKey::MidYear | GradeKey::FinalExam => Ok(EXAM_CAP),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn pair_or_default<'de, D, T>(deserializer: D) -> Result<[T; 2], D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let items: Option<Vec<T>> = Option::deserialize(deserializer)?;
    let mut it = items.unwrap_or_default().into_iter();
    Ok([
        it.next().unwrap_or_default(),
        it.next().unwrap_or_default(),
    ])
}

fn year_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(|| DEFAULT_YEAR.to_string()))
}

// Non-numeric values fall back to the default; numbers are clamped into
// `[0, EXAM_CAP]`.
fn exam_max_or_default<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    let value = raw
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f.round() as i64)))
        .unwrap_or(DEFAULT_EXAM_MAX_GRADE);
    Ok(value.clamp(0, EXAM_CAP))
}

// Stored ledgers may carry keys from older layouts; those are dropped rather
// than failing the whole record.
fn lenient_grades<'de, D>(deserializer: D) -> Result<Grades, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<serde_json::Value>>> =
        Option::deserialize(deserializer)?;
    let mut out = Grades::new();
    for (k, v) in raw.unwrap_or_default() {
        let Ok(key) = k.parse::<GradeKey>() else {
            continue;
        };
        let value = v.and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f.round() as i64)));
        out.insert(key, value);
    }
    Ok(out)
}
