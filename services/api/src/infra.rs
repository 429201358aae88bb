use hireflow::config::DirectoryConfig;
use hireflow::workflows::hiring::{
    Applicant, ApplicantId, ApplicantRepository, DefinitionCatalog, DirectoryError, Flow, FlowId,
    FlowRepository, FormDefinition, HiringPorts, Notification, NotificationError,
    NotificationPublisher, ReferenceId, RepositoryError, TestDefinition, UserDirectory, UserId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryFlowRepository {
    flows: Arc<Mutex<HashMap<FlowId, Flow>>>,
}

impl FlowRepository for InMemoryFlowRepository {
    fn insert(&self, flow: Flow) -> Result<Flow, RepositoryError> {
        let mut guard = lock(&self.flows)?;
        if guard.contains_key(&flow.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(flow.id.clone(), flow.clone());
        Ok(flow)
    }

    fn update(&self, flow: Flow) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.flows)?;
        match guard.get_mut(&flow.id) {
            Some(stored) => {
                *stored = flow;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &FlowId) -> Result<Option<Flow>, RepositoryError> {
        Ok(lock(&self.flows)?.get(id).cloned())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicantRepository {
    applicants: Arc<Mutex<HashMap<ApplicantId, Applicant>>>,
}

impl ApplicantRepository for InMemoryApplicantRepository {
    fn insert(&self, applicant: Applicant) -> Result<Applicant, RepositoryError> {
        let mut guard = lock(&self.applicants)?;
        let taken = guard.values().any(|existing| {
            existing.flow_id == applicant.flow_id && existing.email == applicant.email
        });
        if taken || guard.contains_key(&applicant.id) {
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
        let mut guard = lock(&self.applicants)?;
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
        Ok(lock(&self.applicants)?.get(id).cloned())
    }

    fn find_by_email(
        &self,
        flow_id: &FlowId,
        email: &str,
    ) -> Result<Option<Applicant>, RepositoryError> {
        Ok(lock(&self.applicants)?
            .values()
            .find(|applicant| &applicant.flow_id == flow_id && applicant.email == email)
            .cloned())
    }

    fn list_for_flow(&self, flow_id: &FlowId) -> Result<Vec<Applicant>, RepositoryError> {
        let mut applicants: Vec<Applicant> = lock(&self.applicants)?
            .values()
            .filter(|applicant| &applicant.flow_id == flow_id)
            .cloned()
            .collect();
        applicants.sort_by_key(|applicant| applicant.created_at);
        Ok(applicants)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryCatalog {
    forms: Arc<Mutex<HashMap<ReferenceId, FormDefinition>>>,
    tests: Arc<Mutex<HashMap<ReferenceId, TestDefinition>>>,
}

impl DefinitionCatalog for InMemoryCatalog {
    fn insert_form(&self, form: FormDefinition) -> Result<(), RepositoryError> {
        let mut forms = lock(&self.forms)?;
        if forms.contains_key(&form.id) {
            return Err(RepositoryError::Conflict);
        }
        forms.insert(form.id.clone(), form);
        Ok(())
    }

    fn insert_test(&self, test: TestDefinition) -> Result<(), RepositoryError> {
        let mut tests = lock(&self.tests)?;
        if tests.contains_key(&test.id) {
            return Err(RepositoryError::Conflict);
        }
        tests.insert(test.id.clone(), test);
        Ok(())
    }

    fn form(&self, id: &ReferenceId) -> Result<Option<FormDefinition>, RepositoryError> {
        Ok(lock(&self.forms)?.get(id).cloned())
    }

    fn test(&self, id: &ReferenceId) -> Result<Option<TestDefinition>, RepositoryError> {
        Ok(lock(&self.tests)?.get(id).cloned())
    }
}

/// Directory seeded from configuration: recruiters and interviewers may work on every flow.
#[derive(Debug, Clone, Default)]
pub(crate) struct StaticDirectory {
    recruiters: BTreeSet<UserId>,
    interviewers: BTreeSet<UserId>,
}

impl From<&DirectoryConfig> for StaticDirectory {
    fn from(config: &DirectoryConfig) -> Self {
        Self {
            recruiters: config.recruiters.clone(),
            interviewers: config.interviewers.clone(),
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

/// Stands in for the email sender: logs every notification and keeps a copy.
#[derive(Default, Clone)]
pub(crate) struct LoggingNotificationPublisher {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl NotificationPublisher for LoggingNotificationPublisher {
    fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        info!(
            recipient = %notification.recipient,
            template = ?notification.template,
            "notification queued"
        );
        self.events
            .lock()
            .map_err(|_| NotificationError::Transport("outbox poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}

impl LoggingNotificationPublisher {
    pub(crate) fn events(&self) -> Vec<Notification> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

pub(crate) fn in_memory_ports(
    directory: StaticDirectory,
    notifications: Arc<LoggingNotificationPublisher>,
) -> HiringPorts {
    HiringPorts {
        flows: Arc::new(InMemoryFlowRepository::default()),
        applicants: Arc::new(InMemoryApplicantRepository::default()),
        catalog: Arc::new(InMemoryCatalog::default()),
        directory: Arc::new(directory),
        notifications,
    }
}
