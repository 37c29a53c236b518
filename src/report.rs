//! Semester tables as plain data, shared by the on-screen grid and the
//! paginated export. Every number comes from [`crate::calc`].

use crate::calc::{self, StudentCalc};
use crate::model::{GradeKey, GradebookError, GradebookState, Month, Student};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LANDSCAPE_CHUNK: usize = 20;
pub const DEFAULT_PORTRAIT_CHUNK: usize = 30;

mod labels {
    pub const ROW_NUMBER: &str = "ت";
    pub const STUDENT_NAME: &str = "اسم الطالب";
    pub const FIRST_MONTH: &str = "الشهر الأول";
    pub const SECOND_MONTH: &str = "الشهر الثاني";
    pub const DAILY_TOTAL: &str = "مجموع اليومي";
    pub const EXAM: &str = "التحريري";
    pub const AVERAGE: &str = "المعدل";
    pub const FIRST_SEMESTER_AVG: &str = "معدل الفصل الاول";
    pub const SECOND_SEMESTER_AVG: &str = "معدل الفصل الثاني";
    pub const MID_YEAR: &str = "نصف السنة";
    pub const YEARLY_EFFORT: &str = "السعي السنوي";
    pub const FINAL_EXAM: &str = "الامتحان النهائي";
    pub const FINAL_GRADE: &str = "الدرجة النهائية";
    pub const FIRST: &str = "الاول";
    pub const SECOND: &str = "الثاني";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "landscape" => Some(Self::Landscape),
            "portrait" => Some(Self::Portrait),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
        }
    }
}

/// Students per printed page for each orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    pub landscape_chunk: usize,
    pub portrait_chunk: usize,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            landscape_chunk: DEFAULT_LANDSCAPE_CHUNK,
            portrait_chunk: DEFAULT_PORTRAIT_CHUNK,
        }
    }
}

impl PageLayout {
    pub fn chunk_size(&self, orientation: Orientation) -> usize {
        let n = match orientation {
            Orientation::Landscape => self.landscape_chunk,
            Orientation::Portrait => self.portrait_chunk,
        };
        n.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Cell {
    /// Ungraded; distinct from an entered zero.
    Blank,
    Number(i64),
}

impl Cell {
    fn grade(v: Option<i64>) -> Self {
        v.map(Cell::Number).unwrap_or(Cell::Blank)
    }

    pub fn as_text(&self) -> String {
        match self {
            Cell::Blank => String::new(),
            Cell::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderCell {
    pub label: String,
    pub col_span: usize,
    pub row_span: usize,
}

impl HeaderCell {
    fn single(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            col_span: 1,
            row_span: 1,
        }
    }

    fn tall(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            col_span: 1,
            row_span: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnKind {
    Activity,
    DailyTotal,
    Exam,
    MonthAverage,
    SemesterAverage,
    MidYear,
    YearlyEffort,
    FinalExam,
    FinalGrade,
}

/// Describes one data column (everything right of the name). Columns with a
/// `key` are editable inputs on screen; the rest are computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub kind: ColumnKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<GradeKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoHeader {
    pub teacher_name: String,
    pub class_name: String,
    pub subject_name: String,
    pub school_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    /// Position in the full roster, 1-based.
    pub number: usize,
    pub student_id: i64,
    pub name: String,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterTable {
    pub semester: usize,
    pub title: String,
    pub info: InfoHeader,
    pub header_rows: [Vec<HeaderCell>; 3],
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPage {
    pub page_index: usize,
    pub page_count: usize,
    pub semester: usize,
    pub chunk_index: usize,
    pub chunk_count: usize,
    pub orientation: Orientation,
    pub table: SemesterTable,
}

fn month_columns(sem: usize, month: usize, m: &Month, out: &mut Vec<ColumnSpec>) {
    for col in 0..m.custom_columns.len() {
        out.push(ColumnSpec {
            kind: ColumnKind::Activity,
            month: Some(month),
            key: Some(GradeKey::Activity { sem, month, col }),
        });
    }
    out.push(ColumnSpec {
        kind: ColumnKind::DailyTotal,
        month: Some(month),
        key: None,
    });
    out.push(ColumnSpec {
        kind: ColumnKind::Exam,
        month: Some(month),
        key: Some(GradeKey::MonthExam { sem, month }),
    });
    out.push(ColumnSpec {
        kind: ColumnKind::MonthAverage,
        month: Some(month),
        key: None,
    });
}

fn summary_columns(sem: usize) -> Vec<ColumnSpec> {
    let spec = |kind, key| ColumnSpec {
        kind,
        month: None,
        key,
    };
    if sem == 0 {
        vec![
            spec(ColumnKind::SemesterAverage, None),
            spec(ColumnKind::MidYear, Some(GradeKey::MidYear)),
        ]
    } else {
        vec![
            spec(ColumnKind::SemesterAverage, None),
            spec(ColumnKind::YearlyEffort, None),
            spec(ColumnKind::FinalExam, Some(GradeKey::FinalExam)),
            spec(ColumnKind::FinalGrade, None),
        ]
    }
}

fn summary_label(kind: ColumnKind, sem: usize) -> &'static str {
    match kind {
        ColumnKind::SemesterAverage if sem == 0 => labels::FIRST_SEMESTER_AVG,
        ColumnKind::SemesterAverage => labels::SECOND_SEMESTER_AVG,
        ColumnKind::MidYear => labels::MID_YEAR,
        ColumnKind::YearlyEffort => labels::YEARLY_EFFORT,
        ColumnKind::FinalExam => labels::FINAL_EXAM,
        _ => labels::FINAL_GRADE,
    }
}

fn header_rows(state: &GradebookState, sem: usize, summary: &[ColumnSpec]) -> [Vec<HeaderCell>; 3] {
    let exam_max = state.info.exam_max_grade;
    let months = &state.semesters[sem].months;

    let mut groups = vec![
        HeaderCell::tall(labels::ROW_NUMBER),
        HeaderCell::tall(labels::STUDENT_NAME),
    ];
    let mut titles = Vec::new();
    let mut maxes = Vec::new();

    for (month, m) in months.iter().enumerate() {
        groups.push(HeaderCell {
            label: if month == 0 {
                labels::FIRST_MONTH
            } else {
                labels::SECOND_MONTH
            }
            .to_string(),
            col_span: m.custom_columns.len() + 3,
            row_span: 1,
        });

        for c in &m.custom_columns {
            titles.push(HeaderCell::single(c.title.clone()));
            maxes.push(HeaderCell::single(c.max.to_string()));
        }
        titles.push(HeaderCell::single(labels::DAILY_TOTAL));
        titles.push(HeaderCell::single(labels::EXAM));
        titles.push(HeaderCell::single(labels::AVERAGE));

        let daily_max = m.daily_max();
        let regime = calc::Regime::select(daily_max, exam_max);
        maxes.push(HeaderCell::single(daily_max.to_string()));
        maxes.push(HeaderCell::single(exam_max.to_string()));
        maxes.push(HeaderCell::single(regime.avg_max(daily_max, exam_max).to_string()));
    }

    for spec in summary {
        groups.push(HeaderCell::tall(summary_label(spec.kind, sem)));
    }

    [groups, titles, maxes]
}

fn row_cells(student: &Student, calc: &StudentCalc, sem: usize, columns: &[ColumnSpec]) -> Vec<Cell> {
    let semester = &calc.semesters[sem];
    columns
        .iter()
        .map(|spec| {
            let month = spec.month.map(|m| &semester.months[m]);
            match (spec.kind, month) {
                (ColumnKind::Activity | ColumnKind::Exam, _)
                | (ColumnKind::MidYear | ColumnKind::FinalExam, _) => {
                    Cell::grade(spec.key.and_then(|k| student.grade(k)))
                }
                (ColumnKind::DailyTotal, Some(m)) => Cell::Number(m.daily_total),
                (ColumnKind::MonthAverage, Some(m)) => Cell::Number(m.display_avg),
                (ColumnKind::SemesterAverage, _) => Cell::Number(semester.average),
                (ColumnKind::YearlyEffort, _) => Cell::Number(calc.yearly_effort),
                (ColumnKind::FinalGrade, _) => Cell::Number(calc.final_grade),
                (ColumnKind::DailyTotal | ColumnKind::MonthAverage, None) => Cell::Blank,
            }
        })
        .collect()
}

/// Lays out one semester for `students`, numbering rows from `first_number`.
pub fn build_semester_table(
    state: &GradebookState,
    sem: usize,
    students: &[Student],
    first_number: usize,
) -> Result<SemesterTable, GradebookError> {
    let semester = state.semester(sem)?;

    let mut columns = Vec::new();
    for (month, m) in semester.months.iter().enumerate() {
        month_columns(sem, month, m, &mut columns);
    }
    let summary = summary_columns(sem);
    let header_rows = header_rows(state, sem, &summary);
    columns.extend(summary);

    let mut rows = Vec::with_capacity(students.len());
    for (i, student) in students.iter().enumerate() {
        let calc = calc::calculate_student(state, student)?;
        rows.push(ReportRow {
            number: first_number + i,
            student_id: student.id,
            name: student.name.clone(),
            cells: row_cells(student, &calc, sem, &columns),
        });
    }

    let info = &state.info;
    Ok(SemesterTable {
        semester: sem,
        title: format!(
            "الدرجات اليومية للفصل الدراسي {} - العام الدراسي {}",
            if sem == 0 { labels::FIRST } else { labels::SECOND },
            info.year
        ),
        info: InfoHeader {
            teacher_name: info.teacher_name.clone(),
            class_name: info.class_name.clone(),
            subject_name: info.subject_name.clone(),
            school_name: info.school_name.clone(),
        },
        header_rows,
        columns,
        rows,
    })
}

/// Full-roster table for on-screen editing.
pub fn semester_table(state: &GradebookState, sem: usize) -> Result<SemesterTable, GradebookError> {
    build_semester_table(state, sem, &state.students, 1)
}

/// Splits the roster into page-sized chunks: every semester-0 page first,
/// then every semester-1 page. An empty roster still yields one empty page
/// per semester.
pub fn paginate(
    state: &GradebookState,
    orientation: Orientation,
    chunk_size: usize,
) -> Result<Vec<ReportPage>, GradebookError> {
    let chunk_size = chunk_size.max(1);
    let chunks: Vec<&[Student]> = if state.students.is_empty() {
        vec![&state.students[..]]
    } else {
        state.students.chunks(chunk_size).collect()
    };
    let chunk_count = chunks.len();
    let page_count = chunk_count * state.semesters.len();

    let mut pages = Vec::with_capacity(page_count);
    for sem in 0..state.semesters.len() {
        for (chunk_index, chunk) in chunks.iter().enumerate() {
            let page_index = pages.len();
            pages.push(ReportPage {
                page_index,
                page_count,
                semester: sem,
                chunk_index,
                chunk_count,
                orientation,
                table: build_semester_table(state, sem, chunk, chunk_index * chunk_size + 1)?,
            });
        }
    }
    Ok(pages)
}
