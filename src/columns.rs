use crate::ledger;
use crate::model::{CustomColumn, GradebookError, GradebookState, EXAM_CAP};

pub const DEFAULT_COLUMN_TITLE: &str = "نشاط";
pub const DEFAULT_COLUMN_MAX: i64 = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnField {
    Title(String),
    Max(i64),
}

pub fn add_column(
    state: &mut GradebookState,
    sem: usize,
    month: usize,
    title: Option<&str>,
    max: Option<i64>,
) -> Result<usize, GradebookError> {
    let max = max.unwrap_or(DEFAULT_COLUMN_MAX);
    if max < 0 {
        return Err(GradebookError::NegativeMax(max));
    }
    let cols = &mut state.month_mut(sem, month)?.custom_columns;
    cols.push(CustomColumn {
        title: title.unwrap_or(DEFAULT_COLUMN_TITLE).to_string(),
        max,
    });
    Ok(cols.len() - 1)
}

/// Removes the column and re-keys every student's ledger in the same step,
/// so the column list and the ledger never disagree on column count.
pub fn remove_column(
    state: &mut GradebookState,
    sem: usize,
    month: usize,
    col: usize,
) -> Result<CustomColumn, GradebookError> {
    let cols = &mut state.month_mut(sem, month)?.custom_columns;
    if col >= cols.len() {
        return Err(GradebookError::ColumnOutOfRange {
            col,
            len: cols.len(),
        });
    }
    let removed = cols.remove(col);
    let remaining = cols.len();
    ledger::renumber_after_column_removal(state, sem, month, col, remaining);
    Ok(removed)
}

pub fn update_column(
    state: &mut GradebookState,
    sem: usize,
    month: usize,
    col: usize,
    field: ColumnField,
) -> Result<(), GradebookError> {
    let cols = &mut state.month_mut(sem, month)?.custom_columns;
    let len = cols.len();
    let column = cols
        .get_mut(col)
        .ok_or(GradebookError::ColumnOutOfRange { col, len })?;
    match field {
        ColumnField::Title(t) => column.title = t,
        ColumnField::Max(m) if m < 0 => return Err(GradebookError::NegativeMax(m)),
        ColumnField::Max(m) => column.max = m,
    }
    Ok(())
}

/// Replaces the column lists of the other three month slots with copies of
/// semester 0 / month 0. Grades already entered in those slots are kept
/// as-is.
pub fn copy_first_month_to_all(state: &mut GradebookState) {
    let source = state.semesters[0].months[0].custom_columns.clone();
    for (sem, semester) in state.semesters.iter_mut().enumerate() {
        for (month, m) in semester.months.iter_mut().enumerate() {
            if sem == 0 && month == 0 {
                continue;
            }
            m.custom_columns = source.clone();
        }
    }
}

/// Clamps into `[0, 100]`; the value applies to every month of the record.
pub fn set_exam_max_grade(state: &mut GradebookState, value: i64) -> i64 {
    let v = value.clamp(0, EXAM_CAP);
    state.info.exam_max_grade = v;
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{add_student, set_grade};
    use crate::model::GradeKey;

    fn col(title: &str, max: i64) -> CustomColumn {
        CustomColumn {
            title: title.into(),
            max,
        }
    }

    #[test]
    fn add_column_uses_defaults() {
        let mut state = GradebookState::default();
        assert_eq!(add_column(&mut state, 1, 1, None, None), Ok(0));
        assert_eq!(add_column(&mut state, 1, 1, Some("Quiz"), Some(10)), Ok(1));
        assert_eq!(
            state.semesters[1].months[1].custom_columns,
            vec![col(DEFAULT_COLUMN_TITLE, DEFAULT_COLUMN_MAX), col("Quiz", 10)]
        );
        assert_eq!(
            add_column(&mut state, 2, 0, None, None),
            Err(GradebookError::SemesterOutOfRange(2))
        );
        assert_eq!(
            add_column(&mut state, 0, 2, None, None),
            Err(GradebookError::MonthOutOfRange(2))
        );
    }

    #[test]
    fn remove_middle_column_rekeys_ledger() {
        let mut state = GradebookState::default();
        for t in ["a", "b", "c"] {
            add_column(&mut state, 0, 0, Some(t), Some(10)).expect("add");
        }
        let id = add_student(&mut state, "Ali");
        let key = |col| GradeKey::Activity { sem: 0, month: 0, col };
        set_grade(&mut state, id, key(0), "1").expect("set");
        set_grade(&mut state, id, key(1), "2").expect("set");
        set_grade(&mut state, id, key(2), "3").expect("set");
        // Other month untouched.
        set_grade(&mut state, id, GradeKey::Activity { sem: 0, month: 1, col: 2 }, "9")
            .expect("set");

        let removed = remove_column(&mut state, 0, 0, 1).expect("remove");
        assert_eq!(removed.title, "b");

        let titles: Vec<_> = state.semesters[0].months[0]
            .custom_columns
            .iter()
            .map(|c| c.title.as_str())
            .collect();
        assert_eq!(titles, ["a", "c"]);
        let s = state.student(id).expect("student");
        assert_eq!(s.grade(key(0)), Some(1));
        assert_eq!(s.grade(key(1)), Some(3));
        assert!(!s.grades.contains_key(&key(2)));
        assert_eq!(
            s.grade(GradeKey::Activity { sem: 0, month: 1, col: 2 }),
            Some(9)
        );
    }

    #[test]
    fn remove_column_out_of_range_is_rejected() {
        let mut state = GradebookState::default();
        add_column(&mut state, 0, 0, None, None).expect("add");
        assert_eq!(
            remove_column(&mut state, 0, 0, 1),
            Err(GradebookError::ColumnOutOfRange { col: 1, len: 1 })
        );
    }

    #[test]
    fn update_column_fields() {
        let mut state = GradebookState::default();
        add_column(&mut state, 0, 0, None, None).expect("add");
        update_column(&mut state, 0, 0, 0, ColumnField::Title("Oral".into())).expect("title");
        update_column(&mut state, 0, 0, 0, ColumnField::Max(500)).expect("max");
        assert_eq!(state.semesters[0].months[0].custom_columns[0], col("Oral", 500));
        assert_eq!(
            update_column(&mut state, 0, 0, 0, ColumnField::Max(-1)),
            Err(GradebookError::NegativeMax(-1))
        );
    }

    #[test]
    fn copy_replaces_other_slots_wholesale() {
        let mut state = GradebookState::default();
        add_column(&mut state, 0, 0, Some("HW"), Some(20)).expect("add");
        add_column(&mut state, 0, 0, Some("Quiz"), Some(30)).expect("add");
        add_column(&mut state, 1, 1, Some("Old"), Some(5)).expect("add");

        copy_first_month_to_all(&mut state);

        let expected = vec![col("HW", 20), col("Quiz", 30)];
        for sem in 0..2 {
            for month in 0..2 {
                assert_eq!(state.semesters[sem].months[month].custom_columns, expected);
            }
        }
    }

    #[test]
    fn exam_max_is_clamped() {
        let mut state = GradebookState::default();
        assert_eq!(set_exam_max_grade(&mut state, 150), 100);
        assert_eq!(set_exam_max_grade(&mut state, -3), 0);
        assert_eq!(set_exam_max_grade(&mut state, 40), 40);
        assert_eq!(state.info.exam_max_grade, 40);
    }
}
