use crate::{
    auth::RoleScope,
    data::{Document, Meta, branch::Branch, require, student::Student},
    error::{RegistrarResult, ValidationFailedSnafu},
    report::{ReportRecord, ReportStudent, SubjectMark},
    store::{Collection, DocumentStore, Filter},
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, hash_map::Entry};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    #[serde(flatten)]
    pub meta: Meta,
    pub class_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    #[serde(flatten)]
    pub meta: Meta,
    pub subject_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    #[serde(flatten)]
    pub meta: Meta,
    pub exam_name: String,
}

impl Document for Class {
    const COLLECTION: Collection = Collection::Classes;

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn validate(&self) -> RegistrarResult<()> {
        require("className", &self.class_name, "Please add a class name")
    }
}

impl Document for Subject {
    const COLLECTION: Collection = Collection::Subjects;

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn validate(&self) -> RegistrarResult<()> {
        require("subjectName", &self.subject_name, "Please add a subject name")
    }
}

impl Document for Exam {
    const COLLECTION: Collection = Collection::Exams;

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn validate(&self) -> RegistrarResult<()> {
        require("examName", &self.exam_name, "Please add an exam name")
    }
}

impl Class {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            meta: Meta::new(),
            class_name: class_name.into(),
        }
    }

    pub async fn get_all(store: &DocumentStore) -> RegistrarResult<Vec<Self>> {
        store.find(Filter::new().sorted_by("className")).await
    }

    pub async fn lookup(store: &DocumentStore, id: Option<Uuid>) -> RegistrarResult<Option<Self>> {
        match id {
            Some(id) => store.lookup(id).await,
            None => Ok(None),
        }
    }
}

impl Subject {
    pub fn new(subject_name: impl Into<String>) -> Self {
        Self {
            meta: Meta::new(),
            subject_name: subject_name.into(),
        }
    }

    pub async fn get_all(store: &DocumentStore) -> RegistrarResult<Vec<Self>> {
        store.find(Filter::new().sorted_by("subjectName")).await
    }
}

impl Exam {
    pub fn new(exam_name: impl Into<String>) -> Self {
        Self {
            meta: Meta::new(),
            exam_name: exam_name.into(),
        }
    }

    pub async fn get_all(store: &DocumentStore) -> RegistrarResult<Vec<Self>> {
        store.find(Filter::new().sorted_by("examName")).await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectResult {
    pub subject: Uuid,
    pub cce_mark: f64,
}

/// One student's marks for one exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CceResult {
    #[serde(flatten)]
    pub meta: Meta,
    pub student: Uuid,
    pub exam: Uuid,
    pub class: Uuid,
    #[serde(default)]
    pub subject_results: Vec<SubjectResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCceResult {
    pub student: Uuid,
    pub exam: Uuid,
    ///defaults to the student's current class
    #[serde(default)]
    pub class: Option<Uuid>,
    pub subject_results: Vec<SubjectResult>,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CceQuery {
    pub exam_id: Option<Uuid>,
    pub class_id: Option<Uuid>,
    pub study_centre_id: Option<Uuid>,
}

impl Document for CceResult {
    const COLLECTION: Collection = Collection::CceResults;

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn validate(&self) -> RegistrarResult<()> {
        let mut seen = HashSet::new();
        for SubjectResult { subject, cce_mark } in &self.subject_results {
            snafu::ensure!(
                cce_mark.is_finite() && *cce_mark >= 0.0,
                ValidationFailedSnafu {
                    field: "cceMark",
                    reason: format!("{cce_mark} is not a valid mark"),
                }
            );
            snafu::ensure!(
                seen.insert(*subject),
                ValidationFailedSnafu {
                    field: "subjectResults",
                    reason: format!("subject {subject} has more than one mark"),
                }
            );
        }
        Ok(())
    }
}

impl CceResult {
    ///mark entry: replaces the marks of an existing result for the same student and exam
    pub async fn record(
        store: &DocumentStore,
        scope: RoleScope,
        NewCceResult {
            student,
            exam,
            class,
            subject_results,
        }: NewCceResult,
    ) -> RegistrarResult<Self> {
        let found_student = Student::get_in_scope(store, scope, student).await?;
        store.find_by_id::<Exam>(exam).await?;
        for SubjectResult { subject, .. } in &subject_results {
            store.find_by_id::<Subject>(*subject).await?;
        }

        let class = match class.or(found_student.class) {
            Some(class) => class,
            None => {
                return ValidationFailedSnafu {
                    field: "class",
                    reason: "Student has no class, please pick one",
                }
                .fail();
            }
        };
        store.find_by_id::<Class>(class).await?;

        let existing = store
            .find::<Self>(
                Filter::new()
                    .field_eq_id("student", student)
                    .field_eq_id("exam", exam),
            )
            .await?
            .into_iter()
            .next();

        let result = match existing {
            Some(mut existing) => {
                existing.class = class;
                existing.subject_results = subject_results;
                store.update(existing).await?
            }
            None => {
                store
                    .create(Self {
                        meta: Meta::new(),
                        student,
                        exam,
                        class,
                        subject_results,
                    })
                    .await?
            }
        };

        info!(%student, %exam, marks = result.subject_results.len(), "Recorded CCE marks");
        Ok(result)
    }

    /// Results for an exam and class with students and subjects followed, restricted to the
    /// caller's effective study centre.
    pub async fn get_report_records(
        store: &DocumentStore,
        scope: RoleScope,
        CceQuery {
            exam_id,
            class_id,
            study_centre_id,
        }: CceQuery,
    ) -> RegistrarResult<Vec<ReportRecord>> {
        let branch = scope.effective_branch(study_centre_id)?;

        let mut filter = Filter::new();
        if let Some(exam) = exam_id {
            filter = filter.field_eq_id("exam", exam);
        }
        if let Some(class) = class_id {
            filter = filter.field_eq_id("class", class);
        }
        let results: Vec<Self> = store.find(filter).await?;

        let mut students: HashMap<Uuid, Option<Student>> = HashMap::new();
        let mut subject_names: HashMap<Uuid, Option<String>> = HashMap::new();
        let mut branch_names: HashMap<Uuid, Option<String>> = HashMap::new();
        let mut class_names: HashMap<Uuid, Option<String>> = HashMap::new();

        let mut records = Vec::with_capacity(results.len());
        for result in results {
            if let Entry::Vacant(vac) = students.entry(result.student) {
                vac.insert(store.lookup(result.student).await?);
            }
            let student = students.get(&result.student).cloned().flatten();

            if let Some(branch) = branch {
                if student.as_ref().and_then(|s| s.branch) != Some(branch) {
                    continue;
                }
            }

            let student = match student {
                Some(student) => {
                    let branch_name = match student.branch {
                        Some(id) => {
                            if let Entry::Vacant(vac) = branch_names.entry(id) {
                                vac.insert(
                                    store
                                        .lookup::<Branch>(id)
                                        .await?
                                        .map(|b| b.study_centre_name),
                                );
                            }
                            branch_names.get(&id).cloned().flatten()
                        }
                        None => None,
                    };
                    let class_name = match student.class {
                        Some(id) => {
                            if let Entry::Vacant(vac) = class_names.entry(id) {
                                vac.insert(
                                    store.lookup::<Class>(id).await?.map(|c| c.class_name),
                                );
                            }
                            class_names.get(&id).cloned().flatten()
                        }
                        None => None,
                    };

                    Some(ReportStudent {
                        register_no: Some(student.register_no),
                        student_name: Some(student.student_name),
                        branch: student.branch,
                        branch_name,
                        class_name,
                    })
                }
                None => None,
            };

            let mut marks = Vec::with_capacity(result.subject_results.len());
            for SubjectResult { subject, cce_mark } in result.subject_results {
                if let Entry::Vacant(vac) = subject_names.entry(subject) {
                    vac.insert(store.lookup::<Subject>(subject).await?.map(|s| s.subject_name));
                }
                match subject_names.get(&subject).cloned().flatten() {
                    Some(subject_name) => marks.push(SubjectMark {
                        subject_name,
                        cce_mark,
                    }),
                    None => warn!(%subject, result = %result.meta.id, "Mark for a missing subject"),
                }
            }

            records.push(ReportRecord { student, marks });
        }

        Ok(records)
    }
}
