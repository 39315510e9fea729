//! Task ordering.
//!
//! A plan's tasks form one global sequence numbered `1..=N`. Sections do not
//! store their tasks: a task belongs to the first section whose area code
//! equals its `subject`, or to the unassigned bucket when none matches.
//! Dragging a task into another bucket therefore rewrites its subject and
//! renumbers the whole sequence.
//!
//! [`TaskBoard`] plans moves purely in memory; [`persist`] sends them.

pub mod persist;

use pit_api::models::{Plan, PlanSection, PlanTask};

use crate::error::WorkflowError;

pub use persist::{add_task, move_task, remove_task, update_task};

/// Identifies a bucket of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketKey {
    Section(i64),
    Unassigned,
}

/// Where a dragged task was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropTarget {
    pub bucket: BucketKey,
    /// Drop immediately before this task; `None` drops at the end of the
    /// bucket.
    pub before: Option<i64>,
}

impl DropTarget {
    pub fn end_of(bucket: BucketKey) -> Self {
        Self {
            bucket,
            before: None,
        }
    }
}

/// Placement of one task that differs from the board it was planned on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskChange {
    pub id: i64,
    pub order: u32,
    pub subject: String,
}

/// Result of planning a move or removal: the new sequence and the tasks
/// whose placement changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reorder {
    pub tasks: Vec<PlanTask>,
    pub changes: Vec<TaskChange>,
}

/// Ordered tasks of one plan plus its sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskBoard {
    tasks: Vec<PlanTask>,
    sections: Vec<PlanSection>,
}

impl TaskBoard {
    /// Build a board from a plan; tasks are sorted by their stored order.
    pub fn from_plan(plan: &Plan) -> Self {
        Self::new(plan.tasks.clone(), plan.sections.clone())
    }

    pub fn new(mut tasks: Vec<PlanTask>, mut sections: Vec<PlanSection>) -> Self {
        tasks.sort_by_key(|t| t.order);
        sections.sort_by_key(|s| s.order);
        Self { tasks, sections }
    }

    pub fn tasks(&self) -> &[PlanTask] {
        &self.tasks
    }

    pub fn sections(&self) -> &[PlanSection] {
        &self.sections
    }

    pub fn into_tasks(self) -> Vec<PlanTask> {
        self.tasks
    }

    pub fn task(&self, id: i64) -> Option<&PlanTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Bucket a task belongs to, derived from its subject.
    pub fn bucket_of(&self, task: &PlanTask) -> BucketKey {
        bucket_for(&self.sections, task)
    }

    /// Tasks of `bucket`, in global order.
    pub fn bucket(&self, key: BucketKey) -> Vec<&PlanTask> {
        self.tasks
            .iter()
            .filter(|t| self.bucket_of(t) == key)
            .collect()
    }

    /// Subject a task must carry to land in `key`.
    pub fn subject_for(&self, key: BucketKey) -> Result<String, WorkflowError> {
        match key {
            BucketKey::Unassigned => Ok(String::new()),
            BucketKey::Section(id) => self
                .sections
                .iter()
                .find(|s| s.id == id)
                .map(|s| s.code().to_owned())
                .ok_or(WorkflowError::UnknownSection(id)),
        }
    }

    /// Orders are exactly `1..=N`.
    pub fn is_contiguous(&self) -> bool {
        self.tasks
            .iter()
            .enumerate()
            .all(|(i, t)| t.order as usize == i + 1)
    }

    /// Plan dropping `task_id` on `target`.
    ///
    /// A drop that leaves the task in the same slot of its own bucket keeps
    /// the global sequence; an unassigned task whose subject matches no
    /// section still has it cleared. Returns `None` when nothing would change: same
    /// sequence, same subject, and orders already contiguous. Callers must
    /// not send anything then.
    pub fn plan_move(
        &self,
        task_id: i64,
        target: DropTarget,
    ) -> Result<Option<Reorder>, WorkflowError> {
        let from = self
            .tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or(WorkflowError::UnknownTask(task_id))?;
        let subject = self.subject_for(target.bucket)?;

        let mut list = self.tasks.clone();
        let mut dragged = list.remove(from);
        let same_bucket = self.bucket_of(&dragged) == target.bucket;

        let anchor = match target.before {
            Some(id) if id == task_id => Some(from),
            Some(id) => list.iter().position(|t| t.id == id),
            None => None,
        };
        let at = match anchor {
            Some(idx) => idx,
            None => list
                .iter()
                .rposition(|t| bucket_for(&self.sections, t) == target.bucket)
                .map_or(list.len(), |last| last + 1),
        };

        dragged.subject = subject.clone();
        list.insert(at, dragged);

        // Same slot within its own bucket: keep the global sequence, but
        // still normalize a subject that matches no section.
        if same_bucket
            && self.bucket_ids(&list, target.bucket) == self.bucket_ids(&self.tasks, target.bucket)
        {
            list = self.tasks.clone();
            if let Some(task) = list.iter_mut().find(|t| t.id == task_id) {
                task.subject = subject;
            }
        }
        renumber(&mut list);

        Ok(self.reorder_to(list))
    }

    /// Plan removing `task_id` and closing the gap it leaves.
    pub fn plan_removal(&self, task_id: i64) -> Result<Reorder, WorkflowError> {
        let mut list = self.tasks.clone();
        let idx = list
            .iter()
            .position(|t| t.id == task_id)
            .ok_or(WorkflowError::UnknownTask(task_id))?;
        list.remove(idx);
        renumber(&mut list);

        let changes = diff(&self.tasks, &list);
        Ok(Reorder {
            tasks: list,
            changes,
        })
    }

    /// Order a newly appended task takes.
    pub fn next_order(&self) -> u32 {
        self.tasks.len() as u32 + 1
    }

    fn bucket_ids(&self, tasks: &[PlanTask], key: BucketKey) -> Vec<i64> {
        tasks
            .iter()
            .filter(|t| bucket_for(&self.sections, t) == key)
            .map(|t| t.id)
            .collect()
    }

    fn reorder_to(&self, list: Vec<PlanTask>) -> Option<Reorder> {
        let changes = diff(&self.tasks, &list);
        if changes.is_empty() {
            None
        } else {
            Some(Reorder {
                tasks: list,
                changes,
            })
        }
    }
}

fn bucket_for(sections: &[PlanSection], task: &PlanTask) -> BucketKey {
    sections
        .iter()
        .find(|s| s.code() == task.subject)
        .map_or(BucketKey::Unassigned, |s| BucketKey::Section(s.id))
}

fn renumber(tasks: &mut [PlanTask]) {
    for (i, task) in tasks.iter_mut().enumerate() {
        task.order = i as u32 + 1;
    }
}

/// Tasks of `after` whose order or subject differs from `before`.
fn diff(before: &[PlanTask], after: &[PlanTask]) -> Vec<TaskChange> {
    after
        .iter()
        .filter(|t| {
            before
                .iter()
                .find(|b| b.id == t.id)
                .is_none_or(|b| b.order != t.order || b.subject != t.subject)
        })
        .map(|t| TaskChange {
            id: t.id,
            order: t.order,
            subject: t.subject.clone(),
        })
        .collect()
}
