//! Editing state for the action sequences of one flow.
//!
//! A flow is a tree of `flow_sequence` entities. Sequences sharing a parent,
//! branch (`trueCase`) and display group form an ordered group of actions.

use crate::error::DataResult;
use crate::repository::Repository;
use backoffice_model::Entity;
use backoffice_types::ApiContext;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// Ends the flow; nothing may follow it in its group.
pub const STOP_FLOW_ACTION: &str = "action.stop.flow";
pub const ADD_TAG_ACTION: &str = "action.add.tag";
pub const REMOVE_TAG_ACTION: &str = "action.remove.tag";

/// An action chosen for a sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowAction {
    pub name: String,
    pub config: Value,
}

impl FlowAction {
    pub fn new(name: impl Into<String>, config: Value) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    /// A tag action. The generic add/remove tag actions are specialised to
    /// the entity named in `config.entity`, e.g. `action.add.order.tag`.
    pub fn tag(name: &str, config: Value) -> Self {
        let entity = config.get("entity").and_then(Value::as_str);
        Self::new(expand_tag_action(name, entity), config)
    }
}

/// `action.add.tag` + `order` becomes `action.add.order.tag`. Other names,
/// or a missing entity, are returned unchanged.
pub fn expand_tag_action(name: &str, entity: Option<&str>) -> String {
    match (name, entity) {
        (ADD_TAG_ACTION, Some(entity)) if !entity.is_empty() => format!("action.add.{entity}.tag"),
        (REMOVE_TAG_ACTION, Some(entity)) if !entity.is_empty() => format!("action.remove.{entity}.tag"),
        _ => name.to_string(),
    }
}

/// Holds the sequences of one flow while it is edited.
pub struct FlowSequenceStore {
    repository: Repository,
    sequences: Vec<Entity>,
    removed: Vec<String>,
    invalid: BTreeSet<String>,
}

impl FlowSequenceStore {
    /// An empty store. `repository` must be the `flow_sequence` repository.
    pub fn new(repository: Repository) -> Self {
        Self {
            repository,
            sequences: Vec::new(),
            removed: Vec::new(),
            invalid: BTreeSet::new(),
        }
    }

    /// A store seeded with loaded sequences.
    pub fn with_sequences(repository: Repository, sequences: impl IntoIterator<Item = Entity>) -> Self {
        let mut store = Self::new(repository);
        store.sequences.extend(sequences);
        store
    }

    pub fn sequences(&self) -> &[Entity] {
        &self.sequences
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.sequences.iter().find(|s| s.id() == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.sequences.iter_mut().find(|s| s.id() == id)
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// The sequences with the given ids, ordered by position.
    pub fn sorted_group(&self, ids: &[String]) -> Vec<&Entity> {
        let mut group: Vec<&Entity> = ids.iter().filter_map(|id| self.get(id)).collect();
        group.sort_by_key(|s| position(s));
        group
    }

    /// Sequences below `parent_id` on the given branch, ordered by position.
    pub fn children(&self, parent_id: Option<&str>, true_case: bool) -> Vec<&Entity> {
        let mut group: Vec<&Entity> = self
            .sequences
            .iter()
            .filter(|s| s.get_str("/parentId") == parent_id && is_true_case(s) == true_case)
            .collect();
        group.sort_by_key(|s| position(s));
        group
    }

    /// False once the group contains the stop-flow action.
    pub fn allows_add(&self, ids: &[String]) -> bool {
        !ids
            .iter()
            .filter_map(|id| self.get(id))
            .any(|s| s.get_str("/actionName") == Some(STOP_FLOW_ACTION))
    }

    /// Puts `action` into the group `ids`.
    ///
    /// A single empty action slot is filled in place. Otherwise a new
    /// sequence is appended after the last one of the group, on the same
    /// parent, branch and display group, without a rule. Returns the id of
    /// the sequence holding the action, or `None` when the action has no
    /// name, the group is unknown or already stopped.
    pub fn add_action(&mut self, ids: &[String], action: FlowAction) -> Option<String> {
        if action.name.is_empty() || !self.allows_add(ids) {
            return None;
        }

        if let [id] = ids
            && let Some(sequence) = self.get_mut(id)
            && sequence.get_str("/actionName").is_none_or(str::is_empty)
        {
            sequence
                .set("actionName", action.name)
                .set("config", action.config);
            let id = id.clone();
            self.invalid.remove(&id);
            return Some(id);
        }

        let last = self.sorted_group(ids).last().copied()?;
        let next_position = position(last) + 1;
        let copied: Vec<(&str, Value)> = ["flowId", "parentId", "trueCase", "displayGroup"]
            .into_iter()
            .map(|field| (field, last.get(field).cloned().unwrap_or(Value::Null)))
            .collect();

        let mut sequence = self.repository.create(None);
        for (field, value) in copied {
            sequence.set(field, value);
        }
        sequence
            .set("ruleId", Value::Null)
            .set("actionName", action.name)
            .set("position", next_position)
            .set("config", action.config);

        let id = sequence.id().to_string();
        debug!("Added flow sequence {id} at position {next_position}");
        self.sequences.push(sequence);
        Some(id)
    }

    /// Replaces the action of sequence `id`. Clears its invalid mark.
    pub fn edit_action(&mut self, id: &str, action: FlowAction) -> bool {
        if action.name.is_empty() {
            return false;
        }
        let Some(sequence) = self.get_mut(id) else {
            return false;
        };
        sequence
            .set("actionName", action.name)
            .set("config", action.config);
        self.invalid.remove(id);
        true
    }

    /// Removes sequences. Saved ones are deleted on the next
    /// [`save`](Self::save).
    pub fn remove_sequences(&mut self, ids: &[String]) {
        for id in ids {
            if let Some(index) = self.sequences.iter().position(|s| s.id() == id) {
                let sequence = self.sequences.remove(index);
                if !sequence.is_new() {
                    self.removed.push(sequence.id().to_string());
                }
            }
            self.invalid.remove(id);
        }
    }

    // ── Validation marks ─────────────────────────────────────────

    pub fn set_invalid_sequences(&mut self, ids: impl IntoIterator<Item = String>) {
        self.invalid = ids.into_iter().collect();
    }

    pub fn invalid_sequences(&self) -> &BTreeSet<String> {
        &self.invalid
    }

    pub fn is_invalid(&self, id: &str) -> bool {
        self.invalid.contains(id)
    }

    /// Marks action sequences (those with neither an action nor a rule) that
    /// are still empty, and returns their ids.
    pub fn validate(&mut self) -> Vec<String> {
        let empty: Vec<String> = self
            .sequences
            .iter()
            .filter(|s| {
                s.get_str("/actionName").is_none_or(str::is_empty) && s.get_str("/ruleId").is_none()
            })
            .map(|s| s.id().to_string())
            .collect();
        self.invalid.extend(empty.iter().cloned());
        empty
    }

    // ── Persistence ──────────────────────────────────────────────

    /// Deletes removed sequences and saves every changed one. Returns the
    /// number of requests that changed something.
    pub async fn save(&mut self, context: &ApiContext) -> DataResult<usize> {
        let mut written = 0;
        while let Some(id) = self.removed.first().cloned() {
            self.repository.delete(&id, context).await?;
            self.removed.remove(0);
            written += 1;
        }
        for sequence in &mut self.sequences {
            if sequence.has_changes() {
                self.repository.save(sequence, context).await?;
                written += 1;
            }
        }
        Ok(written)
    }
}

/// Tag names of a tag action, joined for display.
pub fn tag_names(sequence: &Entity) -> Option<String> {
    let name = sequence.get_str("/actionName")?;
    if !(name.contains("tag") && (name.contains("add") || name.contains("remove"))) {
        return None;
    }
    let tags = sequence.pointer("/config/tagIds")?.as_object()?;
    Some(
        tags.values()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
    )
}

fn position(sequence: &Entity) -> i64 {
    sequence.get_number("/position").map_or(0, |p| p as i64)
}

fn is_true_case(sequence: &Entity) -> bool {
    sequence.get_bool("/trueCase").unwrap_or(false)
}
