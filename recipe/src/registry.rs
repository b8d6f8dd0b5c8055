use util::{HashMap, IdVec};

use crate::{Error, Task, TaskId};

/// Holds every task defined for a run, looked up by name.
///
/// Tasks are never mutated or removed once registered.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: IdVec<TaskId, Task>,
    by_name: HashMap<String, TaskId>,
}

impl TaskRegistry {
    /// Add `task` to the registry. Fails if a task with the same name exists,
    /// in which case the existing task is left untouched.
    pub fn register(&mut self, task: Task) -> Result<TaskId, Error> {
        if self.by_name.contains_key(&task.name) {
            return Err(Error::DuplicateTask(task.name));
        }
        let name = task.name.clone();
        let id = self.tasks.push(task);
        self.by_name.insert(name, id);
        log::trace!("registered task {} with id {id:?}", self.tasks.get(id).name);
        Ok(id)
    }

    /// Get the task called `name`.
    pub fn lookup(&self, name: &str) -> Result<&Task, Error> {
        self.by_name
            .get(name)
            .map(|id| self.tasks.get(*id))
            .ok_or_else(|| Error::UnknownTask(name.to_owned()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Names of all registered tasks, in registration order.
    /// Call again to start over.
    pub fn all_names(&self) -> impl Iterator<Item = &str> + Clone + '_ {
        self.tasks.iter().map(|task| task.name.as_str())
    }

    /// All registered tasks, in registration order.
    pub fn iter(&self) -> std::slice::Iter<'_, Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
