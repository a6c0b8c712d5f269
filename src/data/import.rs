use crate::{
    auth::RoleScope,
    data::{
        Document,
        branch::Branch,
        cce::Class,
        student::{NewStudent, Student},
    },
    error::RegistrarResult,
    store::DocumentStore,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvStudent {
    pub student_name: String,
    pub register_no: String,
    #[serde(default)]
    pub admission_no: String,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub academic_year: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub place: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub admitted: Vec<Uuid>,
    pub created_classes: Vec<String>,
    ///one entry per bad row, nothing is written when this isn't empty
    pub errors: Vec<String>,
}

/// Reads every CSV into memory, and only admits anyone once every row parsed and validated.
/// Classes are matched by name and created when missing.
pub async fn import_students(
    store: &DocumentStore,
    scope: RoleScope,
    branch: Option<Uuid>,
    csvs: &[impl AsRef<[u8]>],
) -> RegistrarResult<ImportSummary> {
    let branch = scope.effective_branch(branch)?;
    if let Some(branch) = branch {
        store.find_by_id::<Branch>(branch).await?;
    }

    let mut summary = ImportSummary::default();
    let mut drafts = vec![];

    for csv in csvs {
        let mut rdr = csv::Reader::from_reader(csv.as_ref());
        //header is line 1
        for (line, record) in (2_usize..).zip(rdr.deserialize::<CsvStudent>()) {
            let row = match record {
                Ok(row) => row,
                Err(e) => {
                    summary.errors.push(format!("line {line}: {e}"));
                    continue;
                }
            };

            let class_name = row.class_name.trim().to_string();
            let form = NewStudent {
                student_name: row.student_name,
                register_no: row.register_no,
                admission_no: row.admission_no,
                aadhar: String::new(),
                class: None,
                academic_year: row.academic_year,
                house_name: String::new(),
                father_name: String::new(),
                phone: row.phone,
                dob: None,
                place: row.place,
                district: String::new(),
                post_office: String::new(),
                pin_code: String::new(),
                branch,
            };

            if let Err(e) = Student::from_form(form.clone()).validate() {
                summary.errors.push(format!("line {line}: {e}"));
                continue;
            }
            drafts.push((form, class_name));
        }
    }

    if !summary.errors.is_empty() {
        warn!(errors = summary.errors.len(), "Rejected student import");
        return Ok(summary);
    }

    let mut classes: HashMap<String, Uuid> = Class::get_all(store)
        .await?
        .into_iter()
        .map(|class| (class.class_name, class.meta.id))
        .collect();

    for (mut form, class_name) in drafts {
        if !class_name.is_empty() {
            let class = if let Some(id) = classes.get(&class_name) {
                *id
            } else {
                let created = store.create(Class::new(class_name.clone())).await?;
                summary.created_classes.push(class_name.clone());
                classes.insert(class_name, created.meta.id);
                created.meta.id
            };
            form.class = Some(class);
        }

        summary
            .admitted
            .push(Student::admit(store, scope, form).await?.meta.id);
    }

    info!(
        admitted = summary.admitted.len(),
        new_classes = summary.created_classes.len(),
        "Imported students"
    );
    Ok(summary)
}
