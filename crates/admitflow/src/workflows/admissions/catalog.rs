//! Fixed catalog of document kinds an application can carry.

use serde::{Deserialize, Serialize};

/// Display grouping used by upload forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentGroup {
    PassportInformation,
    AcademicDocuments,
}

impl DocumentGroup {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentGroup::PassportInformation => "Passport Information",
            DocumentGroup::AcademicDocuments => "Academic Documents",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    PassportCopy,
    PassportReceipt,
    CvResume,
    #[serde(rename = "mark10")]
    Mark10,
    #[serde(rename = "mark12")]
    Mark12,
    UgDegree,
    UgMarksheet,
    PgDegree,
    PgMarksheet,
    #[serde(rename = "lor1")]
    Lor1,
    #[serde(rename = "lor2")]
    Lor2,
    WorkExperienceLetter,
    StatementOfPurpose,
    AdditionalDocument,
}

/// Catalog row describing one document kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DocumentSpec {
    pub kind: DocumentKind,
    pub value: &'static str,
    pub label: &'static str,
    pub required: bool,
    pub group: DocumentGroup,
}

const fn spec(
    kind: DocumentKind,
    value: &'static str,
    label: &'static str,
    required: bool,
    group: DocumentGroup,
) -> DocumentSpec {
    DocumentSpec {
        kind,
        value,
        label,
        required,
        group,
    }
}

use DocumentGroup::{AcademicDocuments, PassportInformation};

pub const CATALOG: [DocumentSpec; 14] = [
    spec(DocumentKind::PassportCopy, "passport_copy", "Passport Copy", true, PassportInformation),
    spec(
        DocumentKind::PassportReceipt,
        "passport_receipt",
        "Passport Receipt",
        false,
        PassportInformation,
    ),
    spec(DocumentKind::CvResume, "cv_resume", "CV/Resume", true, AcademicDocuments),
    spec(DocumentKind::Mark10, "mark10", "10th Marksheet", true, AcademicDocuments),
    spec(DocumentKind::Mark12, "mark12", "12th Marksheet", true, AcademicDocuments),
    spec(DocumentKind::UgDegree, "ug_degree", "UG Degree", false, AcademicDocuments),
    spec(DocumentKind::UgMarksheet, "ug_marksheet", "UG Marksheets", false, AcademicDocuments),
    spec(DocumentKind::PgDegree, "pg_degree", "PG Degree", false, AcademicDocuments),
    spec(DocumentKind::PgMarksheet, "pg_marksheet", "PG Marksheets", false, AcademicDocuments),
    spec(DocumentKind::Lor1, "lor1", "LOR 1", false, AcademicDocuments),
    spec(DocumentKind::Lor2, "lor2", "LOR 2", false, AcademicDocuments),
    spec(
        DocumentKind::WorkExperienceLetter,
        "work_experience_letter",
        "Work Experience Letter",
        false,
        AcademicDocuments,
    ),
    spec(
        DocumentKind::StatementOfPurpose,
        "statement_of_purpose",
        "Statement of Purpose",
        false,
        AcademicDocuments,
    ),
    spec(
        DocumentKind::AdditionalDocument,
        "additional_document",
        "Additional Document",
        false,
        AcademicDocuments,
    ),
];

impl DocumentKind {
    pub fn spec(self) -> &'static DocumentSpec {
        // CATALOG is declared in variant order.
        &CATALOG[self as usize]
    }

    pub fn as_wire(self) -> &'static str {
        self.spec().value
    }

    pub fn label(self) -> &'static str {
        self.spec().label
    }

    pub fn is_required(self) -> bool {
        self.spec().required
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        CATALOG
            .iter()
            .find(|row| row.value == value.trim())
            .map(|row| row.kind)
    }

    /// Comment tags are chosen by label in the thread UI.
    pub fn from_label(label: &str) -> Option<Self> {
        CATALOG
            .iter()
            .find(|row| row.label == label.trim())
            .map(|row| row.kind)
    }
}

pub fn required_kinds() -> impl Iterator<Item = DocumentKind> {
    CATALOG.iter().filter(|row| row.required).map(|row| row.kind)
}

/// Required kinds absent from `attached`, in catalog order.
pub fn missing_required<I>(attached: I) -> Vec<DocumentKind>
where
    I: IntoIterator<Item = DocumentKind>,
{
    let attached: Vec<DocumentKind> = attached.into_iter().collect();
    required_kinds()
        .filter(|kind| !attached.contains(kind))
        .collect()
}

/// Catalog rows grouped for display, preserving catalog order within each group.
pub fn grouped() -> Vec<(DocumentGroup, Vec<&'static DocumentSpec>)> {
    let mut groups: Vec<(DocumentGroup, Vec<&'static DocumentSpec>)> = Vec::new();
    for row in CATALOG.iter() {
        match groups.iter_mut().find(|(group, _)| *group == row.group) {
            Some((_, rows)) => rows.push(row),
            None => groups.push((row.group, vec![row])),
        }
    }
    groups
}
