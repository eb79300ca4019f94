/*!
Contracts of the services that consume the flattened records.

The assistant service keeps track of the assistants built on top of a
flattened file, and of what they cost. The completion service runs the
conversations. Neither is implemented here beyond an in-memory store: this
module only fixes their interfaces, and owns the registry of service clients.
*/

use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::Display;
use std::path::PathBuf;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Unauthorized,
    /// The external provider failed or refused the request.
    Upstream,
    Internal,
}

impl ErrorKind {
    /// The HTTP status under which this failure is reported.
    pub fn status(&self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Upstream => 502,
            ErrorKind::Internal => 500,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CollabError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CollabError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> CollabError {
        CollabError {
            kind,
            message: message.into(),
        }
    }
}

impl Error for CollabError {}

impl Display for CollabError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({}): {}", self.kind, self.kind.status(), self.message)
    }
}

// ******** Assistant bookkeeping ********

#[derive(PartialEq, Debug, Clone)]
pub struct AssistantRecord {
    /// Identifier given by the external provider.
    pub external_id: String,
    pub user_id: i64,
    pub name: String,
    pub theme: String,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub message_count: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
}

impl AssistantRecord {
    pub fn new(external_id: &str, user_id: i64, name: &str, theme: &str) -> AssistantRecord {
        AssistantRecord {
            external_id: external_id.to_string(),
            user_id,
            name: name.to_string(),
            theme: theme.to_string(),
            file_name: None,
            file_type: None,
            message_count: 0,
            total_tokens: 0,
            total_cost: 0.0,
        }
    }
}

/// What one exchange with an assistant consumed.
#[derive(PartialEq, Debug, Clone, Copy, Default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
}

impl Usage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

pub trait AssistantStore {
    fn create(&mut self, record: AssistantRecord) -> Result<(), CollabError>;

    fn get(&self, external_id: &str, user_id: i64) -> Option<AssistantRecord>;

    /// The assistants of a user, ordered by external id.
    fn list_for_user(&self, user_id: i64) -> Vec<AssistantRecord>;

    /// Counts one more message and adds its tokens and cost.
    fn record_usage(
        &mut self,
        external_id: &str,
        user_id: i64,
        usage: &Usage,
    ) -> Result<AssistantRecord, CollabError>;

    /// Returns false if there was nothing to delete.
    fn delete(&mut self, external_id: &str, user_id: i64) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryAssistantStore {
    records: BTreeMap<(i64, String), AssistantRecord>,
}

impl MemoryAssistantStore {
    pub fn new() -> MemoryAssistantStore {
        MemoryAssistantStore::default()
    }
}

impl AssistantStore for MemoryAssistantStore {
    fn create(&mut self, record: AssistantRecord) -> Result<(), CollabError> {
        let key = (record.user_id, record.external_id.clone());
        if self.records.contains_key(&key) {
            return Err(CollabError::new(
                ErrorKind::Conflict,
                format!("assistant {} already exists", record.external_id),
            ));
        }
        self.records.insert(key, record);
        Ok(())
    }

    fn get(&self, external_id: &str, user_id: i64) -> Option<AssistantRecord> {
        self.records
            .get(&(user_id, external_id.to_string()))
            .cloned()
    }

    fn list_for_user(&self, user_id: i64) -> Vec<AssistantRecord> {
        self.records
            .range((user_id, String::new())..)
            .take_while(|((uid, _), _)| *uid == user_id)
            .map(|(_, r)| r.clone())
            .collect()
    }

    fn record_usage(
        &mut self,
        external_id: &str,
        user_id: i64,
        usage: &Usage,
    ) -> Result<AssistantRecord, CollabError> {
        let rec = self
            .records
            .get_mut(&(user_id, external_id.to_string()))
            .ok_or_else(|| {
                CollabError::new(
                    ErrorKind::NotFound,
                    format!("no assistant {} for user {}", external_id, user_id),
                )
            })?;
        rec.message_count += 1;
        rec.total_tokens += usage.total_tokens();
        rec.total_cost += usage.cost;
        debug!("record_usage: {:?}", rec);
        Ok(rec.clone())
    }

    fn delete(&mut self, external_id: &str, user_id: i64) -> bool {
        self.records
            .remove(&(user_id, external_id.to_string()))
            .is_some()
    }
}

// ******** Conversations ********

/// The states of a run on the provider side.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Queued | RunStatus::InProgress)
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CompletionRequest {
    /// The system instructions.
    pub instructions: String,
    /// Files attached to the conversation, typically the outputs of the flattening.
    pub documents: Vec<PathBuf>,
    pub messages: Vec<String>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Completion {
    pub response: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

pub trait CompletionService {
    fn complete(&mut self, request: &CompletionRequest) -> Result<Completion, CollabError>;
}

// ******** Clients ********

/// Service clients, one per credential.
///
/// A client is created on first use of its credential and stays until it is
/// invalidated. Nothing is evicted behind the caller's back.
#[derive(Debug)]
pub struct ClientRegistry<C> {
    clients: HashMap<String, C>,
}

impl<C> Default for ClientRegistry<C> {
    fn default() -> Self {
        ClientRegistry {
            clients: HashMap::new(),
        }
    }
}

impl<C> ClientRegistry<C> {
    pub fn new() -> ClientRegistry<C> {
        ClientRegistry::default()
    }

    /// The client for this credential, built with `make` if there is none yet.
    ///
    /// A failure of `make` leaves the registry unchanged.
    pub fn get_or_create<F>(&mut self, key: &str, make: F) -> Result<&mut C, CollabError>
    where
        F: FnOnce(&str) -> Result<C, CollabError>,
    {
        if !self.clients.contains_key(key) {
            debug!("ClientRegistry: creating client");
            let client = make(key)?;
            self.clients.insert(key.to_string(), client);
        }
        self.clients
            .get_mut(key)
            .ok_or_else(|| CollabError::new(ErrorKind::Internal, "client vanished"))
    }

    pub fn get(&self, key: &str) -> Option<&C> {
        self.clients.get(key)
    }

    /// Drops the client of a credential and hands it back.
    pub fn invalidate(&mut self, key: &str) -> Option<C> {
        self.clients.remove(key)
    }

    pub fn clear(&mut self) {
        self.clients.clear();
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
