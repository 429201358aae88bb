use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{Applicant, Flow, Stage, StageType};

/// Templates understood by the e-mail service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateKind {
    StageSubmitted,
    NextStageReady,
}

/// Outbound message; rendering and delivery belong to the notification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: String,
    pub template: TemplateKind,
    pub variables: BTreeMap<String, String>,
}

/// Notification service port.
pub trait NotificationPublisher: Send + Sync {
    fn send(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
    #[error("notification rejected: {0}")]
    Rejected(String),
}

/// What happened to the best-effort notification attached to an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Delivery {
    Sent,
    Failed(String),
    Skipped,
}

/// Builds template variables shared by every message about an applicant's stage.
#[derive(Debug, Clone)]
pub struct NotificationComposer {
    link_base_url: String,
}

impl NotificationComposer {
    pub fn new(link_base_url: impl Into<String>) -> Self {
        let link_base_url = link_base_url.into().trim_end_matches('/').to_string();
        Self { link_base_url }
    }

    pub fn stage_link(&self, flow: &Flow, stage: &Stage, applicant: &Applicant) -> String {
        format!(
            "{}/flows/{}/stages/{}/applicants/{}",
            self.link_base_url, flow.id, stage.id, applicant.id
        )
    }

    pub fn next_stage_ready(
        &self,
        applicant: &Applicant,
        flow: &Flow,
        stage: &Stage,
    ) -> Notification {
        let mut variables = self.base_variables(applicant, flow, stage);
        variables.insert("message".to_string(), next_stage_message(stage));
        variables.insert(
            "next_stage_link".to_string(),
            self.stage_link(flow, stage, applicant),
        );

        Notification {
            recipient: applicant.email.clone(),
            template: TemplateKind::NextStageReady,
            variables,
        }
    }

    pub fn stage_submitted(
        &self,
        applicant: &Applicant,
        flow: &Flow,
        stage: &Stage,
    ) -> Notification {
        let mut variables = self.base_variables(applicant, flow, stage);
        variables.insert(
            "message".to_string(),
            format!("We received your {} submission.", stage.stage_type.label()),
        );

        Notification {
            recipient: applicant.email.clone(),
            template: TemplateKind::StageSubmitted,
            variables,
        }
    }

    fn base_variables(
        &self,
        applicant: &Applicant,
        flow: &Flow,
        stage: &Stage,
    ) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("applicant_name".to_string(), applicant.name.clone()),
            ("flow_name".to_string(), flow.name.clone()),
            ("company_name".to_string(), flow.company.clone()),
            ("stage_type".to_string(), stage.stage_type.label().to_string()),
        ])
    }
}

fn next_stage_message(stage: &Stage) -> String {
    match stage.stage_type {
        StageType::Form => "Please complete the next application form.".to_string(),
        StageType::Test => match stage.test_duration {
            Some(minutes) => format!(
                "You are invited to take a test. You will have {minutes} minutes once you start."
            ),
            None => "You are invited to take a test.".to_string(),
        },
        StageType::Interview => concat!(
            "You have been selected for an interview. ",
            "An interviewer will contact you to schedule it."
        )
        .to_string(),
    }
}
