use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::DocumentKind;

/// Identifier wrapper for student applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub u64);

/// Identifier wrapper for uploaded documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub u64);

/// Identifier wrapper for comment thread entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub u64);

/// Identifier for any account (agent, reviewer, or administrator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Roles recognised by the access control layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Agent,
    Reviewer,
    AgentAdmin,
    ReviewAdmin,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Agent,
        Role::Reviewer,
        Role::AgentAdmin,
        Role::ReviewAdmin,
    ];

    pub const fn as_wire(self) -> &'static str {
        match self {
            Role::Agent => "agent",
            Role::Reviewer => "reviewer",
            Role::AgentAdmin => "agent_admin",
            Role::ReviewAdmin => "review_admin",
        }
    }

    /// Name shown on the login role picker.
    pub const fn label(self) -> &'static str {
        match self {
            Role::Agent => "Agent",
            Role::Reviewer => "Review Team",
            Role::AgentAdmin => "Agent Admin",
            Role::ReviewAdmin => "Review Admin",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.label() == label.trim())
    }

    /// Landing page for a freshly authenticated session.
    pub const fn landing_path(self) -> &'static str {
        match self {
            Role::Agent => "/agent/dashboard",
            Role::Reviewer => "/review/dashboard",
            Role::AgentAdmin => "/admin/agent/dashboard",
            Role::ReviewAdmin => "/review_admin/dashboard",
        }
    }
}

/// Lifecycle status of an application. Serialized in snake_case on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    Active,
    UnderReview,
    ActionRequired,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 6] = [
        ApplicationStatus::Draft,
        ApplicationStatus::Active,
        ApplicationStatus::UnderReview,
        ApplicationStatus::ActionRequired,
        ApplicationStatus::Approved,
        ApplicationStatus::Rejected,
    ];

    const TABLE: [(ApplicationStatus, &'static str, &'static str); 6] = [
        (ApplicationStatus::Draft, "draft", "Draft"),
        (ApplicationStatus::Active, "active", "Active"),
        (ApplicationStatus::UnderReview, "under_review", "Under Review"),
        (
            ApplicationStatus::ActionRequired,
            "action_required",
            "Action Required",
        ),
        (ApplicationStatus::Approved, "approved", "Approved"),
        (ApplicationStatus::Rejected, "rejected", "Rejected"),
    ];

    pub fn as_wire(self) -> &'static str {
        Self::TABLE[self as usize].1
    }

    /// Title-case label for presentation surfaces.
    pub fn label(self) -> &'static str {
        Self::TABLE[self as usize].2
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(_, _, candidate)| *candidate == label.trim())
            .map(|(status, _, _)| *status)
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(_, wire, _)| *wire == value.trim())
            .map(|(status, _, _)| *status)
    }

    /// Approved and rejected applications accept no further transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Approved | ApplicationStatus::Rejected)
    }

    /// Statuses in which an agent may still change the student's details.
    pub const fn allows_content_edits(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Draft
                | ApplicationStatus::Active
                | ApplicationStatus::ActionRequired
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for ApplicationStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_wire(value).ok_or_else(|| UnknownStatus(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown application status '{0}'")]
pub struct UnknownStatus(pub String);

/// Per-document review state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
}

impl DocumentStatus {
    pub const fn as_wire(self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            DocumentStatus::Pending => "Pending",
            DocumentStatus::Approved => "Approved",
            DocumentStatus::Rejected => "Rejected",
        }
    }
}

/// Student details captured by the agent. Every field is free text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StudentProfile {
    pub student_name: String,
    pub mobile: String,
    pub email: String,
    pub country: String,
    #[serde(default)]
    pub state: String,
    pub university: String,
    pub course_name: String,
    #[serde(default)]
    pub course_url: String,
}

impl StudentProfile {
    /// Names of the mandatory fields left blank, in form order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("student_name", &self.student_name),
            ("mobile", &self.mobile),
            ("email", &self.email),
            ("university", &self.university),
            ("country", &self.country),
            ("course_name", &self.course_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Partial update applied by `PATCH /applications/:id`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProfilePatch {
    pub student_name: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub university: Option<String>,
    pub course_name: Option<String>,
    pub course_url: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self == &ProfilePatch::default()
    }

    pub fn apply(&self, profile: &mut StudentProfile) {
        let fields = [
            (&self.student_name, &mut profile.student_name),
            (&self.mobile, &mut profile.mobile),
            (&self.email, &mut profile.email),
            (&self.country, &mut profile.country),
            (&self.state, &mut profile.state),
            (&self.university, &mut profile.university),
            (&self.course_name, &mut profile.course_name),
            (&self.course_url, &mut profile.course_url),
        ];
        for (update, target) in fields {
            if let Some(value) = update {
                *target = value.trim().to_string();
            }
        }
    }
}

/// One student's case file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    #[serde(rename = "agent_id")]
    pub owner: AccountId,
    #[serde(flatten)]
    pub profile: StudentProfile,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when the store allocates a new application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplication {
    pub owner: AccountId,
    pub profile: StudentProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub application_id: ApplicationId,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub file_url: String,
    pub content_type: String,
    pub status: DocumentStatus,
    pub uploaded_at: DateTime<Utc>,
}

impl Document {
    /// Last path segment of the file reference.
    pub fn file_name(&self) -> &str {
        file_name_of(&self.file_url)
    }
}

pub(crate) fn file_name_of(file_url: &str) -> &str {
    file_url
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_url)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub application_id: ApplicationId,
    pub kind: DocumentKind,
    pub file_url: String,
    pub content_type: String,
}

/// Append-only discussion entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub application_id: ApplicationId,
    pub document_id: Option<DocumentId>,
    pub user_id: AccountId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub application_id: ApplicationId,
    pub document_id: Option<DocumentId>,
    pub user_id: AccountId,
    pub text: String,
}
