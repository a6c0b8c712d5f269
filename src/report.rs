//! CCE result reports: a sparse student by subject matrix whose subject columns are discovered
//! from the marks themselves.

use crate::{
    error::{CsvFlushSnafu, CsvSnafu, RegistrarResult, XlsxSnafu},
    maud_conveniences::render_table,
};
use maud::{Markup, html};
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;
use snafu::ResultExt;
use std::{
    collections::HashSet,
    fmt::{Display, Formatter},
};
use uuid::Uuid;

///shown for a subject the student has no mark for
pub const NO_DATA: &str = "-";
///shown for student fields that could not be resolved
pub const NOT_AVAILABLE: &str = "N/A";
pub const SHEET_NAME: &str = "Results";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStudent {
    pub register_no: Option<String>,
    pub student_name: Option<String>,
    pub branch: Option<Uuid>,
    pub branch_name: Option<String>,
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectMark {
    pub subject_name: String,
    pub cce_mark: f64,
}

/// One stored result with its references followed. `student` is `None` when the student has
/// since been deleted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    pub student: Option<ReportStudent>,
    pub marks: Vec<SubjectMark>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Cell {
    Mark(f64),
    NoData,
}

impl Display for Cell {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mark(mark) => write!(f, "{mark}"),
            Self::NoData => f.write_str(NO_DATA),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportRow {
    pub register_no: String,
    pub student_name: String,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub columns: Vec<String>,
    pub rows: Vec<ReportRow>,
    pub branch_name: Option<String>,
    pub class_name: Option<String>,
}

///every subject name across all records, in the order they first show up
pub fn discover_columns(records: &[ReportRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .flat_map(|record| record.marks.iter())
        .filter(|mark| seen.insert(mark.subject_name.as_str()))
        .map(|mark| mark.subject_name.clone())
        .collect()
}

impl Report {
    pub const FIXED_HEADERS: [&'static str; 2] = ["registerNo", "studentName"];

    /// Drops records outside of `branch` (when given), then lays the rest out against the
    /// subjects they mention. Records keep their order.
    pub fn build(records: Vec<ReportRecord>, branch: Option<Uuid>) -> Self {
        let records: Vec<ReportRecord> = records
            .into_iter()
            .filter(|record| {
                branch.is_none_or(|branch| {
                    record.student.as_ref().and_then(|s| s.branch) == Some(branch)
                })
            })
            .collect();

        let columns = discover_columns(&records);

        let names = records.iter().find_map(|record| record.student.as_ref());
        let branch_name = names.and_then(|s| s.branch_name.clone());
        let class_name = names.and_then(|s| s.class_name.clone());

        let rows = records
            .into_iter()
            .map(|ReportRecord { student, marks }| {
                let cells = columns
                    .iter()
                    .map(|column| {
                        marks
                            .iter()
                            .find(|mark| &mark.subject_name == column)
                            .map_or(Cell::NoData, |mark| Cell::Mark(mark.cce_mark))
                    })
                    .collect();

                let (register_no, student_name) = match student {
                    Some(ReportStudent {
                        register_no,
                        student_name,
                        ..
                    }) => (register_no, student_name),
                    None => (None, None),
                };

                ReportRow {
                    register_no: register_no.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                    student_name: student_name.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                    cells,
                }
            })
            .collect();

        Self {
            columns,
            rows,
            branch_name,
            class_name,
        }
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        Self::FIXED_HEADERS
            .into_iter()
            .chain(self.columns.iter().map(String::as_str))
    }

    ///the table exactly as shown, headers first
    pub fn to_strings(&self) -> Vec<Vec<String>> {
        std::iter::once(self.headers().map(ToString::to_string).collect())
            .chain(self.rows.iter().map(|row| {
                [row.register_no.clone(), row.student_name.clone()]
                    .into_iter()
                    .chain(row.cells.iter().map(ToString::to_string))
                    .collect()
            }))
            .collect()
    }

    ///`{branch}({class})`, without an extension
    pub fn file_stem(&self) -> String {
        format!(
            "{}({})",
            self.branch_name.as_deref().unwrap_or(NOT_AVAILABLE),
            self.class_name.as_deref().unwrap_or(NOT_AVAILABLE)
        )
    }

    pub fn file_name(&self) -> String {
        format!("{}.xlsx", self.file_stem())
    }

    pub fn to_xlsx(&self) -> RegistrarResult<Vec<u8>> {
        let mut workbook = Workbook::new();
        let bold = Format::new().set_bold();

        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME).context(XlsxSnafu)?;

        for (col, header) in (0_u16..).zip(self.headers()) {
            sheet
                .write_string_with_format(0, col, header, &bold)
                .context(XlsxSnafu)?;
        }

        for (row, ReportRow {
            register_no,
            student_name,
            cells,
        }) in (1_u32..).zip(&self.rows)
        {
            sheet
                .write_string(row, 0, register_no)
                .context(XlsxSnafu)?;
            sheet
                .write_string(row, 1, student_name)
                .context(XlsxSnafu)?;

            for (col, cell) in (2_u16..).zip(cells) {
                match cell {
                    Cell::Mark(mark) => sheet.write_number(row, col, *mark),
                    Cell::NoData => sheet.write_string(row, col, NO_DATA),
                }
                .context(XlsxSnafu)?;
            }
        }

        workbook.save_to_buffer().context(XlsxSnafu)
    }

    pub fn to_csv(&self) -> RegistrarResult<Vec<u8>> {
        let mut buffer = Vec::new();
        {
            let mut writer = csv::Writer::from_writer(&mut buffer);
            for record in self.to_strings() {
                writer.write_record(&record).context(CsvSnafu)?;
            }
            writer.flush().context(CsvFlushSnafu)?;
        }
        Ok(buffer)
    }

    pub fn render(&self) -> Markup {
        if self.rows.is_empty() {
            return html! {
                p class="text-gray-400" {"No results found for this exam and class."}
            };
        }

        let items = self
            .rows
            .iter()
            .map(|row| {
                [
                    html! {(row.register_no)},
                    html! {(row.student_name)},
                ]
                .into_iter()
                .chain(row.cells.iter().map(|cell| html! {(cell.to_string())}))
                .collect()
            })
            .collect();

        render_table(self.file_stem(), self.headers().collect(), items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};
    use std::io::Cursor;

    fn record(reg: &str, branch: Uuid, marks: &[(&str, f64)]) -> ReportRecord {
        ReportRecord {
            student: Some(ReportStudent {
                register_no: Some(reg.to_string()),
                student_name: Some(format!("Student {reg}")),
                branch: Some(branch),
                branch_name: Some("Tirur".to_string()),
                class_name: Some("Class 5".to_string()),
            }),
            marks: marks
                .iter()
                .map(|(subject_name, cce_mark)| SubjectMark {
                    subject_name: (*subject_name).to_string(),
                    cce_mark: *cce_mark,
                })
                .collect(),
        }
    }

    fn sample() -> (Uuid, Vec<ReportRecord>) {
        let tirur = Uuid::new_v4();
        let records = vec![
            record("R1", tirur, &[("Arabic", 18.0), ("English", 12.5)]),
            record("R2", tirur, &[("English", 0.0), ("Maths", 20.0)]),
            record("R3", tirur, &[]),
        ];
        (tirur, records)
    }

    #[test]
    fn columns_are_exactly_the_subjects_present() {
        let (_, records) = sample();
        let report = Report::build(records.clone(), None);
        assert_eq!(report.columns, ["Arabic", "English", "Maths"]);

        let mut union: Vec<String> = records
            .iter()
            .flat_map(|r| r.marks.iter().map(|m| m.subject_name.clone()))
            .collect();
        union.sort();
        union.dedup();
        let mut columns = report.columns.clone();
        columns.sort();
        assert_eq!(columns, union);
    }

    #[test]
    fn missing_marks_are_no_data_and_zero_stays_zero() {
        let (_, records) = sample();
        let report = Report::build(records, None);

        assert_eq!(report.rows[0].cells[2], Cell::NoData);
        assert_eq!(report.rows[1].cells[0], Cell::NoData);
        assert_eq!(report.rows[1].cells[1], Cell::Mark(0.0));
        assert!(report.rows[2].cells.iter().all(|c| *c == Cell::NoData));

        let table = report.to_strings();
        assert_eq!(table[1], ["R1", "Student R1", "18", "12.5", "-"]);
        assert_eq!(table[2], ["R2", "Student R2", "-", "0", "20"]);
    }

    #[test]
    fn scoping_drops_other_branches_and_their_subjects() {
        let (tirur, mut records) = sample();
        let areekode = Uuid::new_v4();
        records.push(record("R9", areekode, &[("Urdu", 15.0)]));
        records.push(ReportRecord {
            student: None,
            marks: vec![],
        });

        let scoped = Report::build(records.clone(), Some(tirur));
        assert_eq!(scoped.rows.len(), 3);
        assert!(!scoped.columns.iter().any(|c| c == "Urdu"));

        let everything = Report::build(records, None);
        assert_eq!(everything.rows.len(), 5);
        assert_eq!(everything.rows[4].register_no, NOT_AVAILABLE);
        assert_eq!(everything.columns.last().map(String::as_str), Some("Urdu"));
    }

    #[test]
    fn file_names_fall_back_to_na() {
        let (tirur, records) = sample();
        assert_eq!(Report::build(records, Some(tirur)).file_name(), "Tirur(Class 5).xlsx");
        assert_eq!(Report::build(vec![], None).file_name(), "N/A(N/A).xlsx");
    }

    #[test]
    fn xlsx_export_reopens_to_the_rendered_table() {
        let (_, records) = sample();
        let report = Report::build(records, None);
        let bytes = report.to_xlsx().unwrap();

        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        let reopened: Vec<Vec<String>> = range
            .rows()
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        Data::String(s) => s.clone(),
                        Data::Float(f) => f.to_string(),
                        Data::Int(i) => i.to_string(),
                        other => format!("{other:?}"),
                    })
                    .collect()
            })
            .collect();

        assert_eq!(reopened, report.to_strings());
    }

    #[test]
    fn csv_export_matches_the_rendered_table() {
        let (_, records) = sample();
        let report = Report::build(records, None);
        let bytes = report.to_csv().unwrap();

        let reopened: Vec<Vec<String>> = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(bytes.as_slice())
            .records()
            .map(|r| r.unwrap().iter().map(ToString::to_string).collect())
            .collect();

        assert_eq!(reopened, report.to_strings());
    }
}
