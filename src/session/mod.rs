//! The authoring session.
//!
//! A [`Session`] exclusively owns the ordered step list, the results of the
//! steps that ran, the transformation settings and the token store. Runs go
//! through a [`SessionHandle`], which the executor locks only for short
//! snapshot and write-back sections, never across a network call.

use crate::auth::normalize_token;
use crate::catalog::EndpointCatalog;
use crate::config::DEFAULT_BASE_URL;
use crate::error::StepError;
use crate::export::{self, ImportError, ImportReport, SequenceFile};
use crate::models::{EndpointDescriptor, ExecutionResult, SequenceStep};
use crate::storage::TokenStore;
use crate::transform::{self, FieldMapping, TransformedTable, UnifiedColumn};
use crate::variables::{ResultStore, VariableResolver};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Busy marker used when a whole-sequence run blocks an operation.
pub const SEQUENCE_RUN: &str = "sequence";

#[derive(Debug)]
pub struct Session {
    steps: Vec<SequenceStep>,
    results: ResultStore,
    catalog: EndpointCatalog,
    field_mappings: Vec<FieldMapping>,
    unified_columns: Vec<UnifiedColumn>,
    tokens: TokenStore,
    base_url: String,
    running: HashSet<String>,
    sequence_running: bool,
}

/// Everything a run needs, copied out of the session under the lock.
#[derive(Debug, Clone)]
pub(crate) struct RunSnapshot {
    pub step: SequenceStep,
    pub position: usize,
    pub order: Vec<String>,
    pub results: ResultStore,
    pub token: Option<String>,
    pub base_url: String,
}

impl Session {
    pub fn new(catalog: EndpointCatalog) -> Self {
        Self {
            steps: Vec::new(),
            results: ResultStore::new(),
            catalog,
            field_mappings: Vec::new(),
            unified_columns: Vec::new(),
            tokens: TokenStore::in_memory(),
            base_url: DEFAULT_BASE_URL.to_string(),
            running: HashSet::new(),
            sequence_running: false,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_token_store(mut self, tokens: TokenStore) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn catalog(&self) -> &EndpointCatalog {
        &self.catalog
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.base_url = base_url.into();
    }

    // Steps

    /// Appends a step for `endpoint` and returns its new runtime id.
    pub fn add_step(&mut self, endpoint: EndpointDescriptor) -> String {
        let id = Uuid::new_v4().to_string();
        self.steps.push(SequenceStep::new(id.clone(), endpoint));
        id
    }

    /// Appends an already-built step (used by import).
    pub(crate) fn push_step(&mut self, step: SequenceStep) {
        self.steps.push(step);
    }

    /// Removes a step and its stored result.
    pub fn remove_step(&mut self, id: &str) -> Result<SequenceStep, StepError> {
        self.ensure_idle(id)?;
        let position = self
            .position_of(id)
            .ok_or_else(|| StepError::UnknownStep(id.to_string()))?;
        self.results.remove(id);
        Ok(self.steps.remove(position))
    }

    /// Moves a step to `new_position`, clamped to the end of the list.
    ///
    /// References elsewhere keep pointing at the same runtime id; references
    /// that become forward ones fail when the referencing step runs.
    pub fn move_step(&mut self, id: &str, new_position: usize) -> Result<(), StepError> {
        if self.sequence_running {
            return Err(StepError::AlreadyRunning(SEQUENCE_RUN.to_string()));
        }
        let position = self
            .position_of(id)
            .ok_or_else(|| StepError::UnknownStep(id.to_string()))?;
        let step = self.steps.remove(position);
        let target = new_position.min(self.steps.len());
        self.steps.insert(target, step);
        Ok(())
    }

    /// Removes every step and result. Transformation settings are kept.
    pub fn clear(&mut self) -> Result<(), StepError> {
        if self.sequence_running || !self.running.is_empty() {
            return Err(StepError::AlreadyRunning(SEQUENCE_RUN.to_string()));
        }
        self.steps.clear();
        self.results.clear();
        Ok(())
    }

    pub fn steps(&self) -> &[SequenceStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, id: &str) -> Option<&SequenceStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_mut(&mut self, id: &str) -> Option<&mut SequenceStep> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    pub fn step_at(&self, position: usize) -> Option<&SequenceStep> {
        self.steps.get(position)
    }

    pub fn step_ids(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.id.clone()).collect()
    }

    /// Current position of a step in the sequence.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    // Results

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    /// Resolves an expression against the current results, as a step would.
    pub fn resolve(&self, expression: &str) -> Result<Value, StepError> {
        let order = self.step_ids();
        VariableResolver::new(&self.results, &order).resolve(expression)
    }

    /// Result of the last step, by position, that succeeded with data.
    pub fn final_result(&self) -> Option<&ExecutionResult> {
        self.steps
            .iter()
            .rev()
            .filter_map(|step| step.result.as_ref())
            .find(|result| result.is_success() && result.has_data())
    }

    // Transformations

    pub fn field_mappings(&self) -> &[FieldMapping] {
        &self.field_mappings
    }

    pub fn set_field_mappings(&mut self, mappings: Vec<FieldMapping>) {
        self.field_mappings = mappings;
    }

    pub fn unified_columns(&self) -> &[UnifiedColumn] {
        &self.unified_columns
    }

    pub fn set_unified_columns(&mut self, columns: Vec<UnifiedColumn>) {
        self.unified_columns = columns;
    }

    /// Seeds identity mappings from the first record of the final result.
    ///
    /// Returns the number of mappings created; zero when there is no data.
    pub fn auto_populate_field_mappings(&mut self) -> usize {
        let Some(sample) = self
            .final_result()
            .and_then(|result| result.records().into_iter().next())
        else {
            return 0;
        };
        self.field_mappings = transform::auto_populate(&sample);
        self.field_mappings.len()
    }

    pub fn transformed_records(&self) -> Vec<Map<String, Value>> {
        let records = self.final_result().map(|r| r.records()).unwrap_or_default();
        transform::apply(&records, &self.field_mappings, &self.unified_columns)
    }

    pub fn transformed_table(&self) -> TransformedTable {
        let records = self.final_result().map(|r| r.records()).unwrap_or_default();
        TransformedTable::build(&records, &self.field_mappings, &self.unified_columns)
    }

    // Token

    pub fn token(&self) -> Option<String> {
        self.tokens.get()
    }

    /// Stores a token; blank input clears it. Returns whether it persisted.
    pub fn set_token(&self, input: &str) -> bool {
        match normalize_token(input) {
            Some(token) => self.tokens.set(&token),
            None => self.tokens.clear(),
        }
    }

    pub fn clear_token(&self) -> bool {
        self.tokens.clear()
    }

    // Export / import

    pub fn export_sequence(&self, name: &str, description: &str) -> SequenceFile {
        export::export_sequence(self, name, description)
    }

    /// Replaces the sequence with the contents of an exported file.
    pub fn import_sequence(&mut self, text: &str) -> Result<ImportReport, ImportError> {
        if self.sequence_running || !self.running.is_empty() {
            return Err(ImportError::Busy);
        }
        export::import_sequence(self, text)
    }

    // Run bookkeeping

    pub fn is_running(&self, id: &str) -> bool {
        self.running.contains(id)
    }

    pub fn is_sequence_running(&self) -> bool {
        self.sequence_running
    }

    fn ensure_idle(&self, id: &str) -> Result<(), StepError> {
        if self.running.contains(id) {
            return Err(StepError::AlreadyRunning(id.to_string()));
        }
        Ok(())
    }

    /// Marks a step as running, clears its previous outcome and snapshots
    /// what the run needs.
    ///
    /// A single-step run (`in_sequence == false`) is refused while a
    /// sequence run holds the session.
    pub(crate) fn begin_step_run(
        &mut self,
        id: &str,
        in_sequence: bool,
    ) -> Result<RunSnapshot, StepError> {
        if self.sequence_running && !in_sequence {
            return Err(StepError::AlreadyRunning(SEQUENCE_RUN.to_string()));
        }
        let position = self
            .position_of(id)
            .ok_or_else(|| StepError::UnknownStep(id.to_string()))?;
        self.ensure_idle(id)?;

        self.running.insert(id.to_string());
        self.results.remove(id);
        let step = &mut self.steps[position];
        step.reset();

        Ok(RunSnapshot {
            step: step.clone(),
            position,
            order: self.step_ids(),
            results: self.results.clone(),
            token: self.tokens.get(),
            base_url: self.base_url.clone(),
        })
    }

    /// Stores the outcome of a run. A step removed meanwhile is not revived.
    pub(crate) fn finish_step_run(&mut self, id: &str, result: &ExecutionResult) {
        self.running.remove(id);
        if let Some(step) = self.step_mut(id) {
            step.record(result.clone());
            self.results.insert(id, result.clone());
        }
    }

    pub(crate) fn release_step_run(&mut self, id: &str) {
        self.running.remove(id);
    }

    /// Marks the whole sequence as running and returns the step order.
    pub(crate) fn begin_sequence_run(&mut self) -> Result<Vec<String>, StepError> {
        if self.sequence_running || !self.running.is_empty() {
            return Err(StepError::AlreadyRunning(SEQUENCE_RUN.to_string()));
        }
        self.sequence_running = true;
        Ok(self.step_ids())
    }

    pub(crate) fn end_sequence_run(&mut self) {
        self.sequence_running = false;
    }

    /// Replaces steps, results and transformations wholesale.
    pub(crate) fn reset_for_import(
        &mut self,
        field_mappings: Vec<FieldMapping>,
        unified_columns: Vec<UnifiedColumn>,
    ) {
        self.steps.clear();
        self.results.clear();
        self.field_mappings = field_mappings;
        self.unified_columns = unified_columns;
    }
}

/// Shared handle to a session.
#[derive(Debug, Clone)]
pub struct SessionHandle(Arc<Mutex<Session>>);

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    /// Locks the session. A poisoned lock is recovered; the session holds no
    /// invariant that a panicking reader could break halfway.
    pub fn lock(&self) -> MutexGuard<'_, Session> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<Session> for SessionHandle {
    fn from(session: Session) -> Self {
        Self::new(session)
    }
}
