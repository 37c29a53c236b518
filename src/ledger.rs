//! Per-student grade storage and roster mutations.
//!
//! All operations mutate a [`GradebookState`] in place; persistence is a
//! separate whole-record save.

use crate::model::{GradeKey, GradebookError, GradebookState, Student};

/// Parses free-form grade text. Blank, non-numeric and negative input all
/// mean "ungraded".
pub fn parse_grade_input(raw: &str) -> Option<i64> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    match t.parse::<i64>() {
        Ok(v) if v >= 0 => Some(v),
        _ => None,
    }
}

/// Entry-time sanitizing: keep digits only, then clamp to `cap`.
pub fn sanitize_entry(raw: &str, cap: i64) -> Option<i64> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    // Overlong digit runs saturate; they clamp to the cap below anyway.
    let v = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some(v.min(cap.max(0)))
}

/// Stores the parsed value of `raw` without checking it against the cap.
pub fn set_grade(
    state: &mut GradebookState,
    student_id: i64,
    key: GradeKey,
    raw: &str,
) -> Result<Option<i64>, GradebookError> {
    let value = parse_grade_input(raw);
    state.student_mut(student_id)?.grades.insert(key, value);
    Ok(value)
}

/// Grid entry path: sanitizes and clamps to the key's cap, then stores.
pub fn enter_grade(
    state: &mut GradebookState,
    student_id: i64,
    key: GradeKey,
    raw: &str,
) -> Result<Option<i64>, GradebookError> {
    let cap = state.grade_cap(key)?;
    // Validate the student before touching anything.
    state.student(student_id)?;
    let value = sanitize_entry(raw, cap);
    let text = value.map(|v| v.to_string()).unwrap_or_default();
    set_grade(state, student_id, key, &text)
}

fn next_student_id(state: &GradebookState) -> i64 {
    state.students.iter().map(|s| s.id).max().unwrap_or(0) + 1
}

pub fn add_student(state: &mut GradebookState, name: &str) -> i64 {
    let id = next_student_id(state);
    state.students.push(Student::new(id, name.trim()));
    id
}

/// Appends imported names in order with fresh sequential ids. Blank names
/// are skipped.
pub fn append_names<I, S>(state: &mut GradebookState, names: I) -> Vec<i64>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut next = next_student_id(state);
    let mut added = Vec::new();
    for name in names {
        let name = name.as_ref().trim();
        if name.is_empty() {
            continue;
        }
        state.students.push(Student::new(next, name));
        added.push(next);
        next += 1;
    }
    added
}

pub fn rename_student(
    state: &mut GradebookState,
    student_id: i64,
    name: &str,
) -> Result<(), GradebookError> {
    state.student_mut(student_id)?.name = name.to_string();
    Ok(())
}

/// Irreversible: the student's whole ledger goes with it.
pub fn remove_student(state: &mut GradebookState, student_id: i64) -> Result<Student, GradebookError> {
    let idx = state
        .students
        .iter()
        .position(|s| s.id == student_id)
        .ok_or(GradebookError::UnknownStudent(student_id))?;
    Ok(state.students.remove(idx))
}

/// Shifts activity keys above `removed_col` down by one for every student and
/// drops the vacated top key. `remaining_len` is the month's column count
/// after the removal.
pub fn renumber_after_column_removal(
    state: &mut GradebookState,
    sem: usize,
    month: usize,
    removed_col: usize,
    remaining_len: usize,
) {
    let key = |col| GradeKey::Activity { sem, month, col };
    for student in &mut state.students {
        for col in removed_col..remaining_len {
            match student.grades.remove(&key(col + 1)) {
                Some(v) => {
                    student.grades.insert(key(col), v);
                }
                None => {
                    student.grades.remove(&key(col));
                }
            }
        }
        student.grades.remove(&key(remaining_len));
    }
}

/// Pasted text: one name per line.
pub fn names_from_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect()
}

/// Spreadsheet export: the first column of every row after the header row.
pub fn names_from_csv(text: &str) -> Vec<String> {
    text.lines()
        .skip(1)
        .filter_map(|line| first_csv_field(line.trim_end_matches('\r')))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn first_csv_field(line: &str) -> Option<String> {
    let line = line.trim_start_matches('\u{feff}');
    if line.trim().is_empty() {
        return None;
    }
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                buf.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' | ';' | '\t' if !in_quotes => break,
            _ => buf.push(ch),
        }
    }
    Some(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CustomColumn;

    fn activity(col: usize) -> GradeKey {
        GradeKey::Activity { sem: 0, month: 1, col }
    }

    #[test]
    fn blank_and_invalid_input_store_null() {
        let mut state = GradebookState::default();
        let id = add_student(&mut state, "Ali");
        for raw in ["", "   ", "abc", "-4", "3.5"] {
            assert_eq!(set_grade(&mut state, id, GradeKey::MidYear, raw), Ok(None));
            assert_eq!(
                state.students[0].grades.get(&GradeKey::MidYear),
                Some(&None),
                "input {raw:?}"
            );
        }
        assert_eq!(set_grade(&mut state, id, GradeKey::MidYear, " 0 "), Ok(Some(0)));
        assert_eq!(state.students[0].grade(GradeKey::MidYear), Some(0));
    }

    #[test]
    fn set_grade_does_not_clamp() {
        let mut state = GradebookState::default();
        let id = add_student(&mut state, "Ali");
        assert_eq!(set_grade(&mut state, id, GradeKey::FinalExam, "250"), Ok(Some(250)));
    }

    #[test]
    fn entry_clamps_to_column_max() {
        let mut state = GradebookState::default();
        state.semesters[0].months[1].custom_columns.push(CustomColumn {
            title: "Quiz".into(),
            max: 25,
        });
        state.info.exam_max_grade = 60;
        let id = add_student(&mut state, "Ali");

        assert_eq!(enter_grade(&mut state, id, activity(0), "40"), Ok(Some(25)));
        assert_eq!(enter_grade(&mut state, id, activity(0), "1a2"), Ok(Some(12)));
        assert_eq!(enter_grade(&mut state, id, activity(0), "x"), Ok(None));
        assert_eq!(
            enter_grade(&mut state, id, GradeKey::MonthExam { sem: 0, month: 1 }, "99"),
            Ok(Some(60))
        );
        assert_eq!(enter_grade(&mut state, id, GradeKey::MidYear, "101"), Ok(Some(100)));
        assert_eq!(
            enter_grade(&mut state, id, activity(1), "5"),
            Err(GradebookError::ColumnOutOfRange { col: 1, len: 1 })
        );
        assert_eq!(
            enter_grade(&mut state, 99, activity(0), "5"),
            Err(GradebookError::UnknownStudent(99))
        );
    }

    #[test]
    fn ids_are_fresh_and_sequential() {
        let mut state = GradebookState::default();
        assert_eq!(add_student(&mut state, "A"), 1);
        assert_eq!(add_student(&mut state, "B"), 2);
        remove_student(&mut state, 1).expect("remove");
        assert_eq!(append_names(&mut state, ["C", " ", "D"]), vec![3, 4]);
        let names: Vec<_> = state.students.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["B", "C", "D"]);
    }

    #[test]
    fn remove_student_drops_grades() {
        let mut state = GradebookState::default();
        let id = add_student(&mut state, "A");
        set_grade(&mut state, id, GradeKey::MidYear, "50").expect("set");
        let removed = remove_student(&mut state, id).expect("remove");
        assert_eq!(removed.grade(GradeKey::MidYear), Some(50));
        assert!(state.students.is_empty());
        assert_eq!(
            remove_student(&mut state, id),
            Err(GradebookError::UnknownStudent(id))
        );
    }

    #[test]
    fn renumber_shifts_down_and_drops_top_key() {
        let mut state = GradebookState::default();
        let a = add_student(&mut state, "A");
        let b = add_student(&mut state, "B");
        for (col, v) in [(0, "10"), (1, "11"), (2, "12")] {
            set_grade(&mut state, a, activity(col), v).expect("set");
        }
        set_grade(&mut state, b, activity(1), "7").expect("set");

        // Column 1 of 3 removed, two remain.
        renumber_after_column_removal(&mut state, 0, 1, 1, 2);

        let sa = state.student(a).expect("a");
        assert_eq!(sa.grade(activity(0)), Some(10));
        assert_eq!(sa.grade(activity(1)), Some(12));
        assert!(!sa.grades.contains_key(&activity(2)));

        // B had nothing in column 2, so its old column 1 must not survive.
        let sb = state.student(b).expect("b");
        assert!(!sb.grades.contains_key(&activity(1)));
        assert!(!sb.grades.contains_key(&activity(2)));
    }

    #[test]
    fn name_list_parsers() {
        assert_eq!(names_from_lines("Ali\n\n  Sara \r\nOmar"), ["Ali", "Sara", "Omar"]);
        let csv = "Name,Score\n\"Doe, Jane\",4\nOmar;x\n,\n\tEmpty\nZaid";
        assert_eq!(names_from_csv(csv), ["Doe, Jane", "Omar", "Zaid"]);
    }

    #[test]
    fn huge_entries_are_stored_raw_or_clamped_at_entry() {
        let mut state = GradebookState::default();
        state.semesters[0].months[1].custom_columns = vec![CustomColumn {
            title: "big".into(),
            max: i64::MAX,
        }];
        let id = add_student(&mut state, "Ali");

        let raw = set_grade(&mut state, id, GradeKey::MidYear, "9223372036854775807").expect("raw");
        assert_eq!(raw, Some(i64::MAX));
        // Past the i64 range plain parsing fails, which reads as ungraded.
        let past = set_grade(&mut state, id, GradeKey::FinalExam, "99999999999999999999")
            .expect("raw");
        assert_eq!(past, None);

        let entered = enter_grade(&mut state, id, activity(0), "99999999999999999999").expect("entry");
        assert_eq!(entered, Some(i64::MAX));
        let capped = enter_grade(&mut state, id, GradeKey::MidYear, "99999999999999999999")
            .expect("entry");
        assert_eq!(capped, Some(100));
    }
}
