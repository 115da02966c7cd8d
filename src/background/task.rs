//! Deferred task wrappers, one per item mutation.
//!
//! Each wrapper implements [`Mutation`]: apply exactly one change to an
//! [`ItemStore`]. Failures are returned, never handled here. There is no
//! retry, idempotency key or deduplication, so a redelivered [`DeleteTask`]
//! fails with `NotFound` the second time.

use serde::{Deserialize, Serialize};

use crate::store::{Item, ItemChanges, ItemId, ItemStore, NewItem, StoreResult};

/// A single item mutation that can run on a worker.
pub trait Mutation {
    /// Stable task name used in logs and on the wire.
    const NAME: &'static str;

    fn apply(&self, store: &dyn ItemStore) -> StoreResult<TaskOutput>;
}

/// Creates a new, not yet completed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
}

impl Mutation for CreateTask {
    const NAME: &'static str = "create_item";

    fn apply(&self, store: &dyn ItemStore) -> StoreResult<TaskOutput> {
        let item = store.create(&NewItem {
            title: self.title.clone(),
            description: self.description.clone(),
        })?;
        Ok(TaskOutput::Created(item))
    }
}

/// Overwrites title, description and completion of an existing item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTask {
    pub id: ItemId,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
}

impl Mutation for UpdateTask {
    const NAME: &'static str = "update_item";

    fn apply(&self, store: &dyn ItemStore) -> StoreResult<TaskOutput> {
        let changes = ItemChanges {
            title: self.title.clone(),
            description: self.description.clone(),
            completed: self.completed,
        };
        store.update(self.id, &changes).map(TaskOutput::Updated)
    }
}

/// Permanently removes an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteTask {
    pub id: ItemId,
}

impl Mutation for DeleteTask {
    const NAME: &'static str = "delete_item";

    fn apply(&self, store: &dyn ItemStore) -> StoreResult<TaskOutput> {
        store.delete(self.id)?;
        Ok(TaskOutput::Deleted(self.id))
    }
}

/// Any task the queue can carry.
///
/// Serializes as a named invocation, e.g.
/// `{"task":"delete_item","args":{"id":5}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", content = "args")]
pub enum Task {
    #[serde(rename = "create_item")]
    Create(CreateTask),
    #[serde(rename = "update_item")]
    Update(UpdateTask),
    #[serde(rename = "delete_item")]
    Delete(DeleteTask),
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create(_) => CreateTask::NAME,
            Self::Update(_) => UpdateTask::NAME,
            Self::Delete(_) => DeleteTask::NAME,
        }
    }

    pub fn apply(&self, store: &dyn ItemStore) -> StoreResult<TaskOutput> {
        match self {
            Self::Create(task) => task.apply(store),
            Self::Update(task) => task.apply(store),
            Self::Delete(task) => task.apply(store),
        }
    }
}

impl From<CreateTask> for Task {
    fn from(task: CreateTask) -> Self {
        Self::Create(task)
    }
}

impl From<UpdateTask> for Task {
    fn from(task: UpdateTask) -> Self {
        Self::Update(task)
    }
}

impl From<DeleteTask> for Task {
    fn from(task: DeleteTask) -> Self {
        Self::Delete(task)
    }
}

/// What a successful task did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutput {
    Created(Item),
    Updated(Item),
    Deleted(ItemId),
}

impl TaskOutput {
    /// Human-readable summary for the worker log.
    pub fn message(&self) -> String {
        match self {
            Self::Created(item) => format!("Todo created: {}", item.title),
            Self::Updated(item) => format!("Todo updated: {}", item.id),
            Self::Deleted(id) => format!("Todo deleted: {id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SqliteItemStore, StoreError};

    fn store() -> SqliteItemStore {
        SqliteItemStore::open_in_memory().unwrap()
    }

    fn create(store: &SqliteItemStore, title: &str) -> Item {
        let task = CreateTask {
            title: title.to_owned(),
            description: Some("2 litres".to_owned()),
        };
        match task.apply(store).unwrap() {
            TaskOutput::Created(item) => item,
            other => panic!("expected Created, got {other:?}"),
        }
    }

    #[test]
    fn create_yields_one_open_item() {
        let store = store();
        let item = create(&store, "Buy milk");

        assert!(!item.completed);
        assert_eq!(item.description.as_deref(), Some("2 litres"));
        assert_eq!(store.list().unwrap(), vec![item]);
    }

    #[test]
    fn create_message_names_the_title() {
        let store = store();
        let output = Task::from(CreateTask {
            title: "Buy milk".to_owned(),
            description: None,
        })
        .apply(&store)
        .unwrap();
        assert_eq!(output.message(), "Todo created: Buy milk");
    }

    #[test]
    fn update_overwrites_mutable_fields_only() {
        let store = store();
        let item = create(&store, "draft");

        let task = UpdateTask {
            id: item.id,
            title: "done".to_owned(),
            description: None,
            completed: true,
        };
        task.apply(&store).unwrap();

        let stored = store.get(item.id).unwrap();
        assert_eq!(
            (stored.title.as_str(), stored.description.as_deref(), stored.completed),
            ("done", None, true)
        );
        assert_eq!(stored.id, item.id);
        assert_eq!(stored.created, item.created);
    }

    #[test]
    fn repeated_update_is_idempotent() {
        let store = store();
        let item = create(&store, "draft");
        let task = UpdateTask {
            id: item.id,
            title: "t".to_owned(),
            description: Some("d".to_owned()),
            completed: true,
        };

        task.apply(&store).unwrap();
        let once = store.get(item.id).unwrap();
        task.apply(&store).unwrap();
        assert_eq!(store.get(item.id).unwrap(), once);
    }

    #[test]
    fn update_and_delete_of_missing_item_are_not_found() {
        let store = store();
        let ghost = ItemId::new(77);

        let update = UpdateTask {
            id: ghost,
            title: String::new(),
            description: None,
            completed: false,
        };
        assert!(matches!(update.apply(&store), Err(StoreError::NotFound(id)) if id == ghost));
        assert!(DeleteTask { id: ghost }.apply(&store).unwrap_err().is_not_found());
    }

    #[test]
    fn redelivered_delete_fails_the_second_time() {
        let store = store();
        let item = create(&store, "temp");
        let task = Task::from(DeleteTask { id: item.id });

        assert_eq!(task.apply(&store).unwrap(), TaskOutput::Deleted(item.id));
        assert!(store.get(item.id).unwrap_err().is_not_found());
        assert!(task.apply(&store).unwrap_err().is_not_found());
    }

    #[test]
    fn wire_format_is_a_named_invocation() {
        let task = Task::from(DeleteTask { id: ItemId::new(5) });
        assert_eq!(
            serde_json::to_value(&task).unwrap(),
            serde_json::json!({"task": "delete_item", "args": {"id": 5}})
        );

        let parsed: Task = serde_json::from_str(
            r#"{"task":"update_item","args":{"id":5,"title":"t","description":null,"completed":true}}"#,
        )
        .unwrap();
        assert_eq!(parsed.name(), "update_item");
    }
}
