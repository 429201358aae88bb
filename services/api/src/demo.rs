use crate::infra::{in_memory_ports, LoggingNotificationPublisher, StaticDirectory};
use chrono::{Duration, Utc};
use clap::Args;
use hireflow::config::DirectoryConfig;
use hireflow::error::AppError;
use hireflow::workflows::hiring::{
    ApplicantStatusView, ComparableValue, ComponentKind, Condition, Delivery, FieldId, Flow,
    FlowService, FormComponent, FormDefinition, HiringServiceError, NewFlow, Operation,
    ProgressionService, ProgressionSettings, Question, QuestionKind, ReferenceId, Registration,
    StageDraft, StageType, SubmissionOutcome, SubmissionPayload, TestDefinition, UserId,
};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const DEMO_RECRUITER: &str = "demo-recruiter";
const DEMO_INTERVIEWER: &str = "demo-interviewer";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Base URL used when building stage links in notifications
    #[arg(long, default_value = "http://localhost:3000")]
    pub(crate) link_base_url: String,
    /// Also send a receipt after every accepted submission
    #[arg(long)]
    pub(crate) receipts: bool,
    /// Print every notification that would have been emailed
    #[arg(long)]
    pub(crate) show_notifications: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        link_base_url,
        receipts,
        show_notifications,
    } = args;

    let recruiter = UserId::from(DEMO_RECRUITER);
    let interviewer = UserId::from(DEMO_INTERVIEWER);
    let directory = StaticDirectory::from(&DirectoryConfig {
        recruiters: BTreeSet::from([recruiter.clone()]),
        interviewers: BTreeSet::from([interviewer.clone()]),
    });
    let outbox = Arc::new(LoggingNotificationPublisher::default());
    let ports = in_memory_ports(directory, outbox.clone());
    let flows = FlowService::new(ports.clone());
    let progression = ProgressionService::new(
        ports,
        ProgressionSettings {
            link_base_url,
            submission_receipts: receipts,
        },
    );

    println!("Hiring flow demo");
    let flow = author_demo_flow(&flows, &recruiter)?;
    println!(
        "- Flow '{}' at {} with {} stages and {} conditions",
        flow.name,
        flow.company,
        flow.stages.len(),
        flow.conditions.len()
    );
    for (position, stage) in flow.stages.iter().enumerate() {
        println!(
            "  {}. {} ({})",
            position + 1,
            stage.stage_type.label(),
            stage.reference_id
        );
    }

    let now = Utc::now();
    let candidates = [
        ("grace@example.com", "Grace Hopper", "Yes", "let", 8.5),
        ("alan@example.com", "Alan Turing", "No", "var", 0.0),
    ];
    for (email, name, relocate, answer, grade) in candidates {
        println!("\nApplicant {name} <{email}>");
        let registered = match progression.register_applicant(
            &flow.id,
            Registration {
                email: email.to_string(),
                name: name.to_string(),
            },
            now,
        ) {
            Ok(outcome) => outcome,
            Err(err) => {
                println!("  Registration rejected: {err}");
                continue;
            }
        };
        println!(
            "- Registered as {} (invite: {})",
            registered.applicant.applicant_id,
            delivery_label(&registered.notification)
        );

        let mut view = registered.applicant;
        let payloads = [
            SubmissionPayload::Form {
                components: BTreeMap::from([
                    (FieldId::from("relocate"), json!(relocate)),
                    (FieldId::from("years"), json!(4)),
                ]),
            },
            SubmissionPayload::Test {
                started_at: now - Duration::minutes(12),
                answers: BTreeMap::from([(FieldId::from("keyword"), json!(answer))]),
            },
            SubmissionPayload::Interview {
                notes: "Walked through a production incident end to end.".to_string(),
                grade,
            },
        ];
        for payload in payloads {
            let Some(stage_id) = view.current_stage.clone() else {
                break;
            };
            if view.stage_completed {
                println!("  Waiting on a recruiter; the outgoing condition was not met.");
                break;
            }
            let stage_type = payload.stage_type();
            let actor = (stage_type == StageType::Interview).then_some(&interviewer);
            match progression.submit_stage(actor, &view.applicant_id, &stage_id, payload, now) {
                Ok(outcome) => {
                    render_submission(stage_type, &outcome);
                    view = outcome.applicant;
                }
                Err(err) => {
                    println!("  Submission rejected: {err}");
                    break;
                }
            }
        }
        render_status(&view);
    }

    if show_notifications {
        println!("\nNotifications");
        for notification in outbox.events() {
            println!(
                "- {:?} -> {}: {}",
                notification.template,
                notification.recipient,
                notification
                    .variables
                    .get("message")
                    .map(String::as_str)
                    .unwrap_or("")
            );
        }
    }

    Ok(())
}

fn author_demo_flow(flows: &FlowService, recruiter: &UserId) -> Result<Flow, HiringServiceError> {
    flows.define_form(recruiter, demo_form())?;
    flows.define_test(recruiter, demo_test())?;

    let flow = flows.create_flow(
        recruiter,
        NewFlow {
            name: "Backend Engineer".to_string(),
            company: "Hireflow Labs".to_string(),
            start_date: None,
            end_date: None,
        },
    )?;
    let drafts = [
        (StageType::Form, "form-application", None),
        (StageType::Test, "test-rust-basics", Some(20)),
        (StageType::Interview, "plan-technical", None),
    ];
    let mut stages = Vec::with_capacity(drafts.len());
    for (stage_type, reference, test_duration) in drafts {
        stages.push(flows.add_stage(
            recruiter,
            &flow.id,
            StageDraft {
                stage_type,
                reference_id: ReferenceId::from(reference),
                start_date: None,
                end_date: None,
                test_duration,
            },
        )?);
    }

    flows.add_condition(
        recruiter,
        &flow.id,
        Condition {
            from: stages[0].id.clone(),
            to: stages[1].id.clone(),
            field: Some(FieldId::from("relocate")),
            operation: Operation::Eq,
            value: ComparableValue::Text("yes".to_string()),
        },
    )?;
    flows.add_condition(
        recruiter,
        &flow.id,
        Condition {
            from: stages[1].id.clone(),
            to: stages[2].id.clone(),
            field: None,
            operation: Operation::Gte,
            value: ComparableValue::Number(60.0),
        },
    )?;
    flows.set_active(recruiter, &flow.id, true)
}

fn demo_form() -> FormDefinition {
    FormDefinition {
        id: ReferenceId::from("form-application"),
        name: "Application".to_string(),
        components: vec![
            FormComponent {
                id: FieldId::from("relocate"),
                label: "Are you open to relocating?".to_string(),
                kind: ComponentKind::SingleChoice {
                    options: vec!["Yes".to_string(), "No".to_string()],
                },
                required: true,
            },
            FormComponent {
                id: FieldId::from("years"),
                label: "Years of experience".to_string(),
                kind: ComponentKind::Number,
                required: false,
            },
        ],
    }
}

fn demo_test() -> TestDefinition {
    TestDefinition {
        id: ReferenceId::from("test-rust-basics"),
        name: "Rust basics".to_string(),
        questions: vec![Question {
            id: FieldId::from("keyword"),
            prompt: "Which keyword introduces an immutable binding?".to_string(),
            points: 10.0,
            kind: QuestionKind::SingleChoice {
                options: vec!["let".to_string(), "var".to_string(), "const".to_string()],
                correct: "let".to_string(),
            },
        }],
    }
}

fn render_submission(stage_type: StageType, outcome: &SubmissionOutcome) {
    println!(
        "- Submitted {}: decision {:?}, advanced {} (notification: {})",
        stage_type.label(),
        outcome.decision,
        outcome.advanced,
        delivery_label(&outcome.notification)
    );
}

fn render_status(view: &ApplicantStatusView) {
    println!(
        "  Final state: {:?} after {} submission(s)",
        view.state,
        view.stage_submissions.len()
    );
}

fn delivery_label(delivery: &Delivery) -> String {
    match delivery {
        Delivery::Sent => "sent".to_string(),
        Delivery::Skipped => "skipped".to_string(),
        Delivery::Failed(reason) => format!("failed: {reason}"),
    }
}
