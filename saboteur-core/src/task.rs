//! Tasks: the template pool, per-player task instances and the session-wide
//! completion counters that drive the crew's task victory.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::role::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    Short,
    Medium,
    Long,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [TaskKind::Short, TaskKind::Medium, TaskKind::Long];
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Short => write!(f, "short"),
            TaskKind::Medium => write!(f, "medium"),
            TaskKind::Long => write!(f, "long"),
        }
    }
}

/// Newtype for task instance IDs. Unique within a [`TaskEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

/// A task that can be handed out to players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub title: String,
    pub description: String,
    pub location: String,
    pub kind: TaskKind,
}

impl TaskTemplate {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        location: impl Into<String>,
        kind: TaskKind,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            location: location.into(),
            kind,
        }
    }
}

/// A task assigned to one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub location: String,
    pub kind: TaskKind,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    /// Reference to the photo submitted as proof.
    pub proof: Option<String>,
}

impl Task {
    fn from_template(id: TaskId, template: &TaskTemplate) -> Self {
        Self {
            id,
            title: template.title.clone(),
            description: template.description.clone(),
            location: template.location.clone(),
            kind: template.kind,
            completed: false,
            completed_at: None,
            proof: None,
        }
    }

    pub fn complete(&mut self, proof: Option<String>, now: DateTime<Utc>) {
        self.completed = true;
        self.completed_at = Some(now);
        self.proof = proof;
    }

    /// One-line form used in task lists.
    pub fn summary(&self) -> String {
        let mark = if self.completed { "✅" } else { "⬜" };
        format!("{} {} ({}, {})", mark, self.title, self.location, self.kind)
    }
}

fn default_pool() -> Vec<TaskTemplate> {
    vec![
        TaskTemplate::new(
            "Water the plants",
            "Water every plant on the windowsill",
            "Living room",
            TaskKind::Short,
        ),
        TaskTemplate::new(
            "Take out the trash",
            "Carry the bin bag out to the container",
            "Kitchen",
            TaskKind::Short,
        ),
        TaskTemplate::new(
            "Feed the fish",
            "Sprinkle a pinch of food into the aquarium",
            "Hallway",
            TaskKind::Short,
        ),
        TaskTemplate::new(
            "Wash the dishes",
            "Clean every plate left in the sink",
            "Kitchen",
            TaskKind::Medium,
        ),
        TaskTemplate::new(
            "Fold the laundry",
            "Fold the clean clothes from the dryer",
            "Laundry room",
            TaskKind::Medium,
        ),
        TaskTemplate::new(
            "Sweep the porch",
            "Sweep the leaves off the front porch",
            "Porch",
            TaskKind::Medium,
        ),
        TaskTemplate::new(
            "Tidy the bookshelf",
            "Sort the books on the shelf by colour",
            "Study",
            TaskKind::Long,
        ),
        TaskTemplate::new(
            "Assemble the puzzle",
            "Finish the corner section of the jigsaw",
            "Dining room",
            TaskKind::Long,
        ),
        TaskTemplate::new(
            "Rake the garden",
            "Rake the lawn and bag the leaves",
            "Garden",
            TaskKind::Long,
        ),
    ]
}

/// Owns the task pool and the session's completion counters.
#[derive(Debug, Clone)]
pub struct TaskEngine {
    pool: Vec<TaskTemplate>,
    assigned: usize,
    completed: usize,
    next_id: u64,
}

impl Default for TaskEngine {
    fn default() -> Self {
        Self::with_pool(default_pool())
    }
}

impl TaskEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool(pool: Vec<TaskTemplate>) -> Self {
        Self {
            pool,
            assigned: 0,
            completed: 0,
            next_id: 1,
        }
    }

    pub fn pool(&self) -> &[TaskTemplate] {
        &self.pool
    }

    pub fn add_template(&mut self, template: TaskTemplate) {
        self.pool.push(template);
    }

    /// Draws `count` tasks for a player with the given role.
    ///
    /// One task of each kind present in the pool is picked first (as far as
    /// `count` allows), then the rest is filled from a shuffled pool without
    /// repeating a title. Fewer than `count` tasks are returned if the pool
    /// runs out of distinct titles. Only crewmate tasks count towards the
    /// session total; saboteur tasks are cover.
    pub fn assign<R: Rng + ?Sized>(&mut self, role: Role, count: usize, rng: &mut R) -> Vec<Task> {
        let mut picked: Vec<&TaskTemplate> = Vec::with_capacity(count);
        let mut titles: HashSet<&str> = HashSet::new();

        for kind in TaskKind::ALL {
            if picked.len() >= count {
                break;
            }
            let of_kind: Vec<&TaskTemplate> = self.pool.iter().filter(|t| t.kind == kind).collect();
            if let Some(&template) = of_kind.choose(rng) {
                if titles.insert(template.title.as_str()) {
                    picked.push(template);
                }
            }
        }

        let mut shuffled: Vec<&TaskTemplate> = self.pool.iter().collect();
        shuffled.shuffle(rng);
        for template in shuffled {
            if picked.len() >= count {
                break;
            }
            if titles.insert(template.title.as_str()) {
                picked.push(template);
            }
        }

        let picked: Vec<TaskTemplate> = picked.into_iter().cloned().collect();
        let tasks: Vec<Task> = picked
            .iter()
            .map(|template| {
                let id = TaskId(self.next_id);
                self.next_id += 1;
                Task::from_template(id, template)
            })
            .collect();

        if !role.is_saboteur() {
            self.assigned += tasks.len();
        }
        tasks
    }

    pub fn record_completion(&mut self) {
        self.completed += 1;
    }

    pub fn assigned(&self) -> usize {
        self.assigned
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Integer percentage of counted tasks completed, 0 when none assigned.
    pub fn completion_percentage(&self) -> u32 {
        if self.assigned == 0 {
            return 0;
        }
        ((self.completed.min(self.assigned) * 100) / self.assigned) as u32
    }

    pub fn all_completed(&self) -> bool {
        self.assigned > 0 && self.completed >= self.assigned
    }

    /// Clears the counters for a new round. The pool and ID sequence survive.
    pub fn reset(&mut self) {
        self.assigned = 0;
        self.completed = 0;
    }
}
