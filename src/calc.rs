use crate::model::{GradeKey, GradebookError, GradebookState, Student, MONTHS_PER_SEMESTER};
use serde::Serialize;

/// Round half away from zero to the nearest whole point. Out-of-range values
/// saturate at the `i64` bounds.
pub fn round_off(x: f64) -> i64 {
    x.round() as i64
}

/// Which normalization policy produced a month's average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Regime {
    /// Both components are naturally below 100: the average is the raw point
    /// sum (e.g. 40 + 60).
    PointSum,
    /// Daily work and exam are each scaled to 100 and averaged.
    Percentage,
}

impl Regime {
    pub fn select(daily_max: i64, exam_max: i64) -> Self {
        if daily_max > 0 && daily_max < 100 && exam_max > 0 && exam_max < 100 {
            Regime::PointSum
        } else {
            Regime::Percentage
        }
    }

    /// Cap printed over the month's average column.
    pub fn avg_max(self, daily_max: i64, exam_max: i64) -> i64 {
        match self {
            Regime::PointSum => daily_max.saturating_add(exam_max),
            Regime::Percentage => 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthAverage {
    pub daily_total: i64,
    pub daily_max: i64,
    pub exam: i64,
    pub exam_max: i64,
    /// Shown in the month's average column.
    pub display_avg: i64,
    /// 0-100 basis, used only to combine months.
    pub normalized_avg: i64,
    pub avg_max: i64,
    pub regime: Regime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterAverage {
    pub months: [MonthAverage; MONTHS_PER_SEMESTER],
    pub average: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearResult {
    pub yearly_effort: i64,
    pub final_grade: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentCalc {
    pub student_id: i64,
    pub name: String,
    pub semesters: [SemesterAverage; 2],
    pub yearly_effort: i64,
    pub final_grade: i64,
}

fn percent(value: i64, max: i64) -> f64 {
    if max > 0 {
        value as f64 / max as f64 * 100.0
    } else {
        0.0
    }
}

/// Monthly figures for one student. Absent grades count as 0; zero maxima
/// contribute 0 instead of dividing by zero.
pub fn calculate_month(
    state: &GradebookState,
    student: &Student,
    sem: usize,
    month: usize,
) -> Result<MonthAverage, GradebookError> {
    let m = state.month(sem, month)?;

    // Raw entries and column maxima are unbounded; sums saturate instead of overflowing.
    let daily_total = (0..m.custom_columns.len())
        .map(|col| student.grade(GradeKey::Activity { sem, month, col }).unwrap_or(0))
        .fold(0i64, i64::saturating_add);
    let exam = student
        .grade(GradeKey::MonthExam { sem, month })
        .unwrap_or(0);
    let daily_max = m.daily_max();
    let exam_max = state.info.exam_max_grade;

    let regime = Regime::select(daily_max, exam_max);
    let (display_avg, normalized_avg) = match regime {
        Regime::PointSum => {
            let sum = daily_total.saturating_add(exam);
            (sum, round_off(percent(sum, daily_max.saturating_add(exam_max))))
        }
        Regime::Percentage => {
            let avg = round_off((percent(daily_total, daily_max) + percent(exam, exam_max)) / 2.0);
            (avg, avg)
        }
    };

    Ok(MonthAverage {
        daily_total,
        daily_max,
        exam,
        exam_max,
        display_avg,
        normalized_avg,
        avg_max: regime.avg_max(daily_max, exam_max),
        regime,
    })
}

/// Mean of the two months on the normalized scale, never the display scale.
pub fn calculate_semester(
    state: &GradebookState,
    student: &Student,
    sem: usize,
) -> Result<SemesterAverage, GradebookError> {
    let first = calculate_month(state, student, sem, 0)?;
    let second = calculate_month(state, student, sem, 1)?;
    Ok(SemesterAverage {
        months: [first, second],
        average: round_off((first.normalized_avg as f64 + second.normalized_avg as f64) / 2.0),
    })
}

pub fn calculate_year(
    first_semester_avg: i64,
    mid_year: Option<i64>,
    second_semester_avg: i64,
    final_exam: Option<i64>,
) -> YearResult {
    let yearly_effort = round_off(
        (first_semester_avg as f64 + mid_year.unwrap_or(0) as f64 + second_semester_avg as f64)
            / 3.0,
    );
    let final_grade = round_off((yearly_effort as f64 + final_exam.unwrap_or(0) as f64) / 2.0);
    YearResult {
        yearly_effort,
        final_grade,
    }
}

pub fn calculate_student(
    state: &GradebookState,
    student: &Student,
) -> Result<StudentCalc, GradebookError> {
    let first = calculate_semester(state, student, 0)?;
    let second = calculate_semester(state, student, 1)?;
    let year = calculate_year(
        first.average,
        student.grade(GradeKey::MidYear),
        second.average,
        student.grade(GradeKey::FinalExam),
    );
    Ok(StudentCalc {
        student_id: student.id,
        name: student.name.clone(),
        semesters: [first, second],
        yearly_effort: year.yearly_effort,
        final_grade: year.final_grade,
    })
}

pub fn calculate_record(state: &GradebookState) -> Result<Vec<StudentCalc>, GradebookError> {
    state
        .students
        .iter()
        .map(|s| calculate_student(state, s))
        .collect()
}
