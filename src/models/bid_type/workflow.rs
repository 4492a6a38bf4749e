//! In-memory workflow engine for a single bid type.
//!
//! All validation of statuses and transitions happens here, on a [`Workflow`]
//! value that the query layer loads, mutates and writes back as one document.
//! Nothing in this module touches the database.

use std::fmt;

use super::types::*;

/// Refusals raised by workflow mutations and status changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    InvalidPosition(i32),
    DuplicatePosition(i32),
    DuplicateName(String),
    StatusNotFound(i32),
    ProtectedStatus(i32),
    InvalidPositions { from: i32, to: i32 },
    DuplicateTransition { from: i32, to: i32 },
    TransitionNotFound { from: i32, to: i32 },
    UnknownStatus(String),
    TransitionNotAllowed { from: String, to: String },
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowError::InvalidPosition(p) => {
                write!(f, "Position must be between {OPEN_POSITION} and {CLOSED_POSITION} (got {p})")
            }
            WorkflowError::DuplicatePosition(p) => write!(f, "Status with position {p} already exists"),
            WorkflowError::DuplicateName(n) => write!(f, "Status with name '{n}' already exists"),
            WorkflowError::StatusNotFound(p) => write!(f, "Bid status at position {p} not found"),
            WorkflowError::ProtectedStatus(p) => {
                write!(f, "Cannot delete default open or closed status (position {p})")
            }
            WorkflowError::InvalidPositions { from, to } => {
                write!(f, "Invalid status positions: {from} -> {to}")
            }
            WorkflowError::DuplicateTransition { from, to } => {
                write!(f, "Transition {from} -> {to} already exists")
            }
            WorkflowError::TransitionNotFound { from, to } => {
                write!(f, "Transition {from} -> {to} not found")
            }
            WorkflowError::UnknownStatus(n) => write!(f, "Unknown status '{n}' for this bid type"),
            WorkflowError::TransitionNotAllowed { from, to } => {
                write!(f, "Transition from '{from}' to '{to}' is not allowed")
            }
        }
    }
}

impl std::error::Error for WorkflowError {}

impl WorkflowError {
    /// Whether the error means the addressed status or transition does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            WorkflowError::StatusNotFound(_) | WorkflowError::TransitionNotFound { .. }
        )
    }
}

impl Workflow {
    pub fn new(statuses: Vec<Status>, transitions: Vec<Transition>) -> Self {
        Workflow { statuses, transitions }
    }

    /// Statuses ordered by ascending position, regardless of storage order.
    pub fn sorted_statuses(&self) -> Vec<Status> {
        let mut statuses = self.statuses.clone();
        statuses.sort_by_key(|s| s.position);
        statuses
    }

    pub fn status_at(&self, position: i32) -> Option<&Status> {
        self.statuses.iter().find(|s| s.position == position)
    }

    pub fn status_named(&self, name: &str) -> Option<&Status> {
        self.statuses.iter().find(|s| s.name == name)
    }

    pub fn initial_status(&self) -> Option<&Status> {
        self.status_at(OPEN_POSITION)
    }

    pub fn add_status(&mut self, new: NewStatus) -> Result<Status, WorkflowError> {
        if !(OPEN_POSITION..=CLOSED_POSITION).contains(&new.position) {
            return Err(WorkflowError::InvalidPosition(new.position));
        }
        if self.status_at(new.position).is_some() {
            return Err(WorkflowError::DuplicatePosition(new.position));
        }
        if self.status_named(&new.name).is_some() {
            return Err(WorkflowError::DuplicateName(new.name));
        }

        let status = Status {
            name: new.name,
            position: new.position,
            allowed_actions: new.allowed_actions.unwrap_or_default(),
            color: new.color,
            responsible_role_id: new.responsible_role_id,
            responsible_user_id: new.responsible_user_id,
        };
        self.statuses.push(status.clone());
        Ok(status)
    }

    /// Rename a status and optionally replace its allowed actions.
    ///
    /// Anchors are updatable like any other status, and the new name is not
    /// checked against the other statuses.
    pub fn update_status(&mut self, position: i32, update: StatusUpdate) -> Result<Status, WorkflowError> {
        let status = self
            .statuses
            .iter_mut()
            .find(|s| s.position == position)
            .ok_or(WorkflowError::StatusNotFound(position))?;

        status.name = update.name;
        if let Some(actions) = update.allowed_actions {
            status.allowed_actions = actions;
        }
        Ok(status.clone())
    }

    /// Remove a non-anchor status. Transitions touching it are left in place.
    pub fn remove_status(&mut self, position: i32) -> Result<Status, WorkflowError> {
        if position == OPEN_POSITION || position == CLOSED_POSITION {
            return Err(WorkflowError::ProtectedStatus(position));
        }
        let index = self
            .statuses
            .iter()
            .position(|s| s.position == position)
            .ok_or(WorkflowError::StatusNotFound(position))?;
        Ok(self.statuses.remove(index))
    }

    /// Add a directed edge. Self-loops and reverse edges are accepted.
    pub fn add_transition(&mut self, transition: Transition) -> Result<Transition, WorkflowError> {
        let Transition { from_position: from, to_position: to } = transition;
        if self.status_at(from).is_none() || self.status_at(to).is_none() {
            return Err(WorkflowError::InvalidPositions { from, to });
        }
        if self.transitions.contains(&transition) {
            return Err(WorkflowError::DuplicateTransition { from, to });
        }
        self.transitions.push(transition);
        Ok(transition)
    }

    pub fn remove_transition(&mut self, from: i32, to: i32) -> Result<Transition, WorkflowError> {
        let index = self
            .transitions
            .iter()
            .position(|t| t.from_position == from && t.to_position == to)
            .ok_or(WorkflowError::TransitionNotFound { from, to })?;
        Ok(self.transitions.remove(index))
    }

    pub fn is_transition_allowed(&self, from: i32, to: i32) -> bool {
        self.transitions
            .iter()
            .any(|t| t.from_position == from && t.to_position == to)
    }

    /// Existing statuses reachable in one step from `from`, ordered by position.
    /// Dangling edges are skipped.
    pub fn next_statuses(&self, from: i32) -> Vec<Status> {
        let mut next: Vec<Status> = self
            .transitions
            .iter()
            .filter(|t| t.from_position == from)
            .filter_map(|t| self.status_at(t.to_position).cloned())
            .collect();
        next.sort_by_key(|s| s.position);
        next.dedup_by_key(|s| s.position);
        next
    }

    /// Statuses a bid currently in the status named `current` may move to.
    ///
    /// A status that is no longer part of the workflow (removed, or created
    /// before enforcement) can only go back to the open status.
    pub fn next_for_status_name(&self, current: &str) -> Vec<Status> {
        match self.status_named(current) {
            Some(from) => self.next_statuses(from.position),
            None => self.initial_status().cloned().into_iter().collect(),
        }
    }

    /// Validate moving a bid from status `current` to status `target` (both by name).
    ///
    /// Returns the target status on success.
    pub fn check_status_change(&self, current: &str, target: &str) -> Result<&Status, WorkflowError> {
        let to = self
            .status_named(target)
            .ok_or_else(|| WorkflowError::UnknownStatus(target.to_string()))?;

        let allowed = match self.status_named(current) {
            Some(from) => self.is_transition_allowed(from.position, to.position),
            None => to.position == OPEN_POSITION,
        };
        if allowed {
            Ok(to)
        } else {
            Err(WorkflowError::TransitionNotAllowed {
                from: current.to_string(),
                to: target.to_string(),
            })
        }
    }
}
