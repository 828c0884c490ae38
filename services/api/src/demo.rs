use crate::infra::Workflows;
use admitflow::config::AuthConfig;
use admitflow::error::AppError;
use admitflow::workflows::admissions::catalog::{grouped, required_kinds};
use admitflow::workflows::admissions::{
    Actor, ApplicationId, ApplicationPatch, DocumentId, DocumentKind, DocumentStatus,
    ProfilePatch, ReviewDecision, Role, StudentProfile, UploadRequest, WorkflowEvent,
};
use clap::Args;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Student name used for the demo application
    #[arg(long)]
    pub(crate) student: Option<String>,
    /// Print the final application detail as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

const DEMO_PASSWORD: &str = "demo-password";

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let workflows = Workflows::in_memory(&AuthConfig {
        jwt_secret: "admitflow-demo".to_string(),
        session_ttl_minutes: 60,
        bootstrap_accounts: Vec::new(),
    });
    let accounts = &workflows.accounts;
    let admissions = &workflows.admissions;

    let agent_a = actor(accounts.provision(
        "Asha",
        "asha@agency.example",
        DEMO_PASSWORD,
        Role::Agent,
    )?);
    let agent_b = actor(accounts.provision(
        "Bilal",
        "bilal@agency.example",
        DEMO_PASSWORD,
        Role::Agent,
    )?);
    let reviewer = actor(accounts.provision(
        "Rhea",
        "rhea@review.example",
        DEMO_PASSWORD,
        Role::Reviewer,
    )?);
    let admin = actor(accounts.provision(
        "Arun",
        "arun@agency.example",
        DEMO_PASSWORD,
        Role::AgentAdmin,
    )?);

    println!("Admissions workflow demo");
    println!("\nDocument checklist");
    for (group, specs) in grouped() {
        println!("  {}", group.label());
        for spec in specs {
            let marker = if spec.required { "*" } else { " " };
            println!("   {marker} {}", spec.label);
        }
    }

    let profile = StudentProfile {
        student_name: args.student.unwrap_or_else(|| "Priya Raman".to_string()),
        mobile: "+91 98450 12345".to_string(),
        email: "priya.raman@example.com".to_string(),
        country: "Germany".to_string(),
        state: "Bavaria".to_string(),
        university: "TU Munich".to_string(),
        course_name: "MSc Informatics".to_string(),
        course_url: "https://www.tum.de/".to_string(),
    };
    let application = admissions.create_application(&agent_a, profile)?;
    let id = application.id;
    step(&format!(
        "Agent A created application {} for {}",
        id, application.profile.student_name
    ));
    show_status(&workflows, &agent_a, id)?;

    match admissions.transition(&agent_a, id, WorkflowEvent::Submit) {
        Ok(_) => step("Unexpected: submitted without documents"),
        Err(err) => step(&format!("Submit without documents refused: {err}")),
    }

    let mut uploaded: Vec<(DocumentKind, DocumentId)> = Vec::new();
    for kind in required_kinds() {
        let document = admissions.upload_document(
            &agent_a,
            UploadRequest {
                application_id: id,
                kind,
                file_url: format!("uploads/{}/{}.pdf", id, kind.as_wire()),
            },
        )?;
        step(&format!(
            "Uploaded {} ({})",
            kind.label(),
            document.content_type
        ));
        uploaded.push((kind, document.id));
    }

    admissions.transition(&agent_a, id, WorkflowEvent::Submit)?;
    step("Submitted for review");
    show_status(&workflows, &agent_a, id)?;

    let (_, passport) = uploaded[0];
    let review = admissions.review_document(
        &reviewer,
        passport,
        ReviewDecision {
            status: DocumentStatus::Rejected,
            comment: Some("Passport scan is cropped; please upload all pages".to_string()),
        },
    )?;
    step(&format!(
        "Reviewer rejected {} -> application is {}",
        review.document.kind.label(),
        review.application.status.label()
    ));

    match admissions.update_application(
        &agent_b,
        id,
        ApplicationPatch {
            profile: ProfilePatch {
                course_name: Some("MSc Robotics".to_string()),
                ..ProfilePatch::default()
            },
            status: None,
        },
    ) {
        Ok(_) => step("Unexpected: Agent B edited Agent A's application"),
        Err(err) => step(&format!("Agent B edit refused: {err}")),
    }

    admissions.delete_document(&agent_a, passport)?;
    let replacement = admissions.upload_document(
        &agent_a,
        UploadRequest {
            application_id: id,
            kind: DocumentKind::PassportCopy,
            file_url: format!("uploads/{id}/passport_copy_full.pdf"),
        },
    )?;
    uploaded[0] = (DocumentKind::PassportCopy, replacement.id);
    step("Replaced the rejected passport copy");

    admissions.transition(&agent_a, id, WorkflowEvent::Submit)?;
    step("Resubmitted");
    show_status(&workflows, &agent_a, id)?;

    for (kind, document_id) in &uploaded {
        admissions.review_document(
            &reviewer,
            *document_id,
            ReviewDecision {
                status: DocumentStatus::Approved,
                comment: None,
            },
        )?;
        step(&format!("Reviewer approved {}", kind.label()));
    }
    admissions.transition(&reviewer, id, WorkflowEvent::Approve)?;
    step("Application approved");
    show_status(&workflows, &agent_a, id)?;

    let moved = workflows
        .admin
        .reassign(&admin, id, agent_b.account_id)?;
    step(&format!(
        "Agent admin reassigned application {} to agent {} (status {})",
        moved.id,
        moved.owner,
        moved.status.label()
    ));
    println!(
        "  Agent A sees {} application(s); Agent B sees {}",
        admissions.list_applications(&agent_a)?.len(),
        admissions.list_applications(&agent_b)?.len()
    );

    let dashboard = workflows.admin.dashboard(&admin)?;
    println!("\nDashboard");
    for entry in dashboard.statuses.iter().filter(|entry| entry.count > 0) {
        println!("  {}: {}", entry.label, entry.count);
    }

    if args.json {
        let detail = admissions.detail(&agent_b, id)?;
        match serde_json::to_string_pretty(&detail) {
            Ok(json) => println!("\nApplication detail:\n{json}"),
            Err(err) => println!("\nApplication detail unavailable: {err}"),
        }
    }

    Ok(())
}

fn actor(account: admitflow::workflows::accounts::Account) -> Actor {
    Actor::new(account.id, account.role)
}

fn step(message: &str) {
    println!("- {message}");
}

fn show_status(workflows: &Workflows, viewer: &Actor, id: ApplicationId) -> Result<(), AppError> {
    let detail = workflows.admissions.detail(viewer, id)?;
    let missing: Vec<&str> = detail
        .missing_required
        .iter()
        .map(|kind| kind.label())
        .collect();
    println!(
        "  status: {} | documents: {} | missing: {}",
        detail.status_label,
        detail.documents.len(),
        if missing.is_empty() {
            "none".to_string()
        } else {
            missing.join(", ")
        }
    );
    Ok(())
}
