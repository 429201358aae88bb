use std::sync::Arc;

use super::domain::{Applicant, ApplicantId, Flow, FlowId, ReferenceId, UserId};
use super::notification::NotificationPublisher;
use super::submission::{FormDefinition, TestDefinition};

/// Flow storage. Stages and conditions are embedded in the stored flow.
pub trait FlowRepository: Send + Sync {
    fn insert(&self, flow: Flow) -> Result<Flow, RepositoryError>;
    /// Unversioned, last writer wins. Structural edits rely on the flow being inactive, which
    /// also closes registration.
    fn update(&self, flow: Flow) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &FlowId) -> Result<Option<Flow>, RepositoryError>;
}

/// Applicant storage with compare-and-swap writes.
pub trait ApplicantRepository: Send + Sync {
    /// Fails with `Conflict` when the (flow, email) pair is already registered.
    fn insert(&self, applicant: Applicant) -> Result<Applicant, RepositoryError>;
    /// Stores `applicant` only if the stored version still equals `expected_version`, returning
    /// the record with its version bumped; a stale version yields `Conflict`.
    fn update(
        &self,
        applicant: Applicant,
        expected_version: u64,
    ) -> Result<Applicant, RepositoryError>;
    fn fetch(&self, id: &ApplicantId) -> Result<Option<Applicant>, RepositoryError>;
    fn find_by_email(
        &self,
        flow_id: &FlowId,
        email: &str,
    ) -> Result<Option<Applicant>, RepositoryError>;
    fn list_for_flow(&self, flow_id: &FlowId) -> Result<Vec<Applicant>, RepositoryError>;
}

/// Form and test definitions referenced by stages.
///
/// Definitions are write-once: inserting an id that already exists fails with `Conflict`, so a
/// stage's referenced definition never changes underneath it.
pub trait DefinitionCatalog: Send + Sync {
    fn insert_form(&self, form: FormDefinition) -> Result<(), RepositoryError>;
    fn insert_test(&self, test: TestDefinition) -> Result<(), RepositoryError>;
    fn form(&self, id: &ReferenceId) -> Result<Option<FormDefinition>, RepositoryError>;
    fn test(&self, id: &ReferenceId) -> Result<Option<TestDefinition>, RepositoryError>;
}

/// User-directory service port, consulted before any flow or stage mutation.
pub trait UserDirectory: Send + Sync {
    fn is_authorized(&self, user: &UserId, flow: &FlowId) -> Result<bool, DirectoryError>;
    fn is_interviewer(&self, user: &UserId) -> Result<bool, DirectoryError>;
    /// Whether the user may create flows and define forms or tests.
    fn is_recruiter(&self, user: &UserId) -> Result<bool, DirectoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists or was modified concurrently")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("user directory unreachable: {0}")]
    Unavailable(String),
    #[error("user directory returned an error: {0}")]
    Upstream(String),
}

/// Every collaborator the hiring services talk to.
#[derive(Clone)]
pub struct HiringPorts {
    pub flows: Arc<dyn FlowRepository>,
    pub applicants: Arc<dyn ApplicantRepository>,
    pub catalog: Arc<dyn DefinitionCatalog>,
    pub directory: Arc<dyn UserDirectory>,
    pub notifications: Arc<dyn NotificationPublisher>,
}
