use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::hiring::domain::{
    Applicant, ApplicantId, ComparableValue, Condition, FieldId, Flow, FlowId, Operation,
    ReferenceId, Stage, StageType, UserId,
};
use crate::workflows::hiring::notification::{
    Notification, NotificationError, NotificationPublisher,
};
use crate::workflows::hiring::repository::{
    ApplicantRepository, DefinitionCatalog, DirectoryError, FlowRepository, HiringPorts,
    RepositoryError, UserDirectory,
};
use crate::workflows::hiring::submission::{
    ComponentKind, FormComponent, FormDefinition, Question, QuestionKind, TestDefinition,
};
use crate::workflows::hiring::{
    FlowService, NewFlow, ProgressionService, ProgressionSettings, StageDraft,
};

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 14, 10, 0, 0)
        .single()
        .expect("valid instant")
}

pub(super) fn recruiter() -> UserId {
    UserId::from("rita")
}

pub(super) fn interviewer() -> UserId {
    UserId::from("ivan")
}

pub(super) fn outsider() -> UserId {
    UserId::from("mallory")
}

#[derive(Default)]
pub(super) struct MemoryFlows {
    flows: Mutex<HashMap<FlowId, Flow>>,
}

impl FlowRepository for MemoryFlows {
    fn insert(&self, flow: Flow) -> Result<Flow, RepositoryError> {
        let mut guard = self.flows.lock().expect("lock");
        if guard.contains_key(&flow.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(flow.id.clone(), flow.clone());
        Ok(flow)
    }

    fn update(&self, flow: Flow) -> Result<(), RepositoryError> {
        let mut guard = self.flows.lock().expect("lock");
        match guard.get_mut(&flow.id) {
            Some(stored) => {
                *stored = flow;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &FlowId) -> Result<Option<Flow>, RepositoryError> {
        Ok(self.flows.lock().expect("lock").get(id).cloned())
    }
}

#[derive(Default)]
pub(super) struct MemoryApplicants {
    applicants: Mutex<HashMap<ApplicantId, Applicant>>,
}

impl MemoryApplicants {
    /// Overwrite a record as a competing writer would, bumping its version.
    pub(super) fn force(&self, mut applicant: Applicant) {
        let mut guard = self.applicants.lock().expect("lock");
        applicant.version += 1;
        guard.insert(applicant.id.clone(), applicant);
    }
}

impl ApplicantRepository for MemoryApplicants {
    fn insert(&self, applicant: Applicant) -> Result<Applicant, RepositoryError> {
        let mut guard = self.applicants.lock().expect("lock");
        if guard
            .values()
            .any(|stored| stored.flow_id == applicant.flow_id && stored.email == applicant.email)
        {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(applicant.id.clone(), applicant.clone());
        Ok(applicant)
    }

    fn update(
        &self,
        mut applicant: Applicant,
        expected_version: u64,
    ) -> Result<Applicant, RepositoryError> {
        let mut guard = self.applicants.lock().expect("lock");
        let stored = guard
            .get_mut(&applicant.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.version != expected_version {
            return Err(RepositoryError::Conflict);
        }
        applicant.version = expected_version + 1;
        *stored = applicant.clone();
        Ok(applicant)
    }

    fn fetch(&self, id: &ApplicantId) -> Result<Option<Applicant>, RepositoryError> {
        Ok(self.applicants.lock().expect("lock").get(id).cloned())
    }

    fn find_by_email(
        &self,
        flow_id: &FlowId,
        email: &str,
    ) -> Result<Option<Applicant>, RepositoryError> {
        Ok(self
            .applicants
            .lock()
            .expect("lock")
            .values()
            .find(|stored| &stored.flow_id == flow_id && stored.email == email)
            .cloned())
    }

    fn list_for_flow(&self, flow_id: &FlowId) -> Result<Vec<Applicant>, RepositoryError> {
        let mut applicants: Vec<Applicant> = self
            .applicants
            .lock()
            .expect("lock")
            .values()
            .filter(|stored| &stored.flow_id == flow_id)
            .cloned()
            .collect();
        applicants.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(applicants)
    }
}

/// Loses every compare-and-swap: a competing writer records the same submission first.
pub(super) struct RacingApplicants {
    pub(super) inner: MemoryApplicants,
    raced: AtomicBool,
}

impl RacingApplicants {
    pub(super) fn new() -> Self {
        Self {
            inner: MemoryApplicants::default(),
            raced: AtomicBool::new(false),
        }
    }
}

impl ApplicantRepository for RacingApplicants {
    fn insert(&self, applicant: Applicant) -> Result<Applicant, RepositoryError> {
        self.inner.insert(applicant)
    }

    fn update(
        &self,
        applicant: Applicant,
        expected_version: u64,
    ) -> Result<Applicant, RepositoryError> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            self.inner.force(applicant.clone());
        }
        self.inner.update(applicant, expected_version)
    }

    fn fetch(&self, id: &ApplicantId) -> Result<Option<Applicant>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn find_by_email(
        &self,
        flow_id: &FlowId,
        email: &str,
    ) -> Result<Option<Applicant>, RepositoryError> {
        self.inner.find_by_email(flow_id, email)
    }

    fn list_for_flow(&self, flow_id: &FlowId) -> Result<Vec<Applicant>, RepositoryError> {
        self.inner.list_for_flow(flow_id)
    }
}

#[derive(Default)]
pub(super) struct MemoryCatalog {
    forms: Mutex<HashMap<ReferenceId, FormDefinition>>,
    tests: Mutex<HashMap<ReferenceId, TestDefinition>>,
}

impl DefinitionCatalog for MemoryCatalog {
    fn insert_form(&self, form: FormDefinition) -> Result<(), RepositoryError> {
        let mut forms = self.forms.lock().expect("lock");
        if forms.contains_key(&form.id) {
            return Err(RepositoryError::Conflict);
        }
        forms.insert(form.id.clone(), form);
        Ok(())
    }

    fn insert_test(&self, test: TestDefinition) -> Result<(), RepositoryError> {
        let mut tests = self.tests.lock().expect("lock");
        if tests.contains_key(&test.id) {
            return Err(RepositoryError::Conflict);
        }
        tests.insert(test.id.clone(), test);
        Ok(())
    }

    fn form(&self, id: &ReferenceId) -> Result<Option<FormDefinition>, RepositoryError> {
        Ok(self.forms.lock().expect("lock").get(id).cloned())
    }

    fn test(&self, id: &ReferenceId) -> Result<Option<TestDefinition>, RepositoryError> {
        Ok(self.tests.lock().expect("lock").get(id).cloned())
    }
}

/// Recruiters and interviewers may act on every flow; everyone else on none.
pub(super) struct StaticDirectory {
    recruiters: BTreeSet<UserId>,
    interviewers: BTreeSet<UserId>,
}

impl Default for StaticDirectory {
    fn default() -> Self {
        Self {
            recruiters: BTreeSet::from([recruiter()]),
            interviewers: BTreeSet::from([interviewer()]),
        }
    }
}

impl UserDirectory for StaticDirectory {
    fn is_authorized(&self, user: &UserId, _flow: &FlowId) -> Result<bool, DirectoryError> {
        Ok(self.recruiters.contains(user) || self.interviewers.contains(user))
    }

    fn is_interviewer(&self, user: &UserId) -> Result<bool, DirectoryError> {
        Ok(self.interviewers.contains(user))
    }

    fn is_recruiter(&self, user: &UserId) -> Result<bool, DirectoryError> {
        Ok(self.recruiters.contains(user))
    }
}

pub(super) struct UnavailableDirectory;

impl UserDirectory for UnavailableDirectory {
    fn is_authorized(&self, _user: &UserId, _flow: &FlowId) -> Result<bool, DirectoryError> {
        Err(DirectoryError::Unavailable("connection refused".to_string()))
    }

    fn is_interviewer(&self, _user: &UserId) -> Result<bool, DirectoryError> {
        Err(DirectoryError::Unavailable("connection refused".to_string()))
    }

    fn is_recruiter(&self, _user: &UserId) -> Result<bool, DirectoryError> {
        Err(DirectoryError::Unavailable("connection refused".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifications {
    events: Mutex<Vec<Notification>>,
}

impl MemoryNotifications {
    pub(super) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("lock").clone()
    }
}

impl NotificationPublisher for MemoryNotifications {
    fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        self.events.lock().expect("lock").push(notification);
        Ok(())
    }
}

pub(super) struct FailingNotifications;

impl NotificationPublisher for FailingNotifications {
    fn send(&self, _notification: Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay offline".to_string()))
    }
}

pub(super) fn screening_form() -> FormDefinition {
    FormDefinition {
        id: ReferenceId::from("form-screening"),
        name: "Screening".to_string(),
        components: vec![
            FormComponent {
                id: FieldId::from("relocate"),
                label: "Willing to relocate?".to_string(),
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

pub(super) fn skills_test() -> TestDefinition {
    TestDefinition {
        id: ReferenceId::from("test-skills"),
        name: "Skills".to_string(),
        questions: vec![
            Question {
                id: FieldId::from("q1"),
                prompt: "Which keyword declares an immutable binding?".to_string(),
                points: 5.0,
                kind: QuestionKind::SingleChoice {
                    options: vec!["let".to_string(), "var".to_string()],
                    correct: "let".to_string(),
                },
            },
            Question {
                id: FieldId::from("q2"),
                prompt: "Which types are Copy?".to_string(),
                points: 5.0,
                kind: QuestionKind::MultipleChoice {
                    options: vec!["u32".to_string(), "String".to_string(), "bool".to_string()],
                    correct: vec!["u32".to_string(), "bool".to_string()],
                },
            },
        ],
    }
}

/// Test whose questions are all worth nothing.
pub(super) fn ungraded_test() -> TestDefinition {
    TestDefinition {
        id: ReferenceId::from("test-ungraded"),
        name: "Culture questionnaire".to_string(),
        questions: vec![Question {
            id: FieldId::from("q1"),
            prompt: "Describe your ideal team".to_string(),
            points: 0.0,
            kind: QuestionKind::OpenEnded,
        }],
    }
}

pub(super) fn relocate_condition(flow: &Flow, wanted: &str) -> Condition {
    Condition {
        from: flow.stages[0].id.clone(),
        to: flow.stages[1].id.clone(),
        field: Some(FieldId::from("relocate")),
        operation: Operation::Eq,
        value: ComparableValue::Text(wanted.to_string()),
    }
}

pub(super) fn score_condition(flow: &Flow, from: usize, threshold: f64) -> Condition {
    Condition {
        from: flow.stages[from].id.clone(),
        to: flow.stages[from + 1].id.clone(),
        field: None,
        operation: Operation::Gte,
        value: ComparableValue::Number(threshold),
    }
}

pub(super) struct Harness {
    pub(super) flows: FlowService,
    pub(super) progression: ProgressionService,
    pub(super) notifications: Arc<MemoryNotifications>,
    pub(super) ports: HiringPorts,
}

pub(super) fn ports_with(
    applicants: Arc<dyn ApplicantRepository>,
    directory: Arc<dyn UserDirectory>,
    notifications: Arc<dyn NotificationPublisher>,
) -> HiringPorts {
    HiringPorts {
        flows: Arc::new(MemoryFlows::default()),
        applicants,
        catalog: Arc::new(MemoryCatalog::default()),
        directory,
        notifications,
    }
}

pub(super) fn harness_with(
    ports: HiringPorts,
    notifications: Arc<MemoryNotifications>,
) -> Harness {
    Harness {
        flows: FlowService::new(ports.clone()),
        progression: ProgressionService::new(ports.clone(), ProgressionSettings::default()),
        notifications,
        ports,
    }
}

pub(super) fn harness() -> Harness {
    let notifications = Arc::new(MemoryNotifications::default());
    let ports = ports_with(
        Arc::new(MemoryApplicants::default()),
        Arc::new(StaticDirectory::default()),
        notifications.clone(),
    );
    harness_with(ports, notifications)
}

impl Harness {
    /// Author a flow with one stage per entry, attach `conditions`, and activate it.
    pub(super) fn active_flow(
        &self,
        stage_types: &[StageType],
        conditions: impl Fn(&Flow) -> Vec<Condition>,
    ) -> Flow {
        let rita = recruiter();
        let form = screening_form();
        if self.ports.catalog.form(&form.id).expect("catalog").is_none() {
            self.flows.define_form(&rita, form).expect("form defined");
        }
        for test in [skills_test(), ungraded_test()] {
            if self.ports.catalog.test(&test.id).expect("catalog").is_none() {
                self.flows.define_test(&rita, test).expect("test defined");
            }
        }

        let flow = self
            .flows
            .create_flow(
                &rita,
                NewFlow {
                    name: "Backend Engineer".to_string(),
                    company: "Acme".to_string(),
                    start_date: None,
                    end_date: None,
                },
            )
            .expect("flow created");

        for stage_type in stage_types {
            let reference_id = match stage_type {
                StageType::Form => ReferenceId::from("form-screening"),
                StageType::Test => ReferenceId::from("test-skills"),
                StageType::Interview => ReferenceId::from("plan-onsite"),
            };
            self.flows
                .add_stage(
                    &rita,
                    &flow.id,
                    StageDraft {
                        stage_type: *stage_type,
                        reference_id,
                        start_date: None,
                        end_date: None,
                        test_duration: None,
                    },
                )
                .expect("stage added");
        }

        let authored = self.flows.flow(&rita, &flow.id).expect("flow readable");
        for condition in conditions(&authored) {
            self.flows
                .add_condition(&rita, &flow.id, condition)
                .expect("condition added");
        }
        self.flows
            .set_active(&rita, &flow.id, true)
            .expect("flow activated")
    }

    pub(super) fn register(&self, flow: &Flow, email: &str) -> Applicant {
        let outcome = self
            .progression
            .register_applicant(
                &flow.id,
                crate::workflows::hiring::Registration {
                    email: email.to_string(),
                    name: "Ada Lovelace".to_string(),
                },
                now(),
            )
            .expect("registration succeeds");
        self.ports
            .applicants
            .fetch(&outcome.applicant.applicant_id)
            .expect("fetch succeeds")
            .expect("applicant stored")
    }
}

pub(super) fn stage_of(flow: &Flow, index: usize) -> &Stage {
    &flow.stages[index]
}

pub(super) async fn read_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    let value = serde_json::from_slice(&bytes).expect("json body");
    (status, value)
}
