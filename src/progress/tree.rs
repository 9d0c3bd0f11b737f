// src/progress/tree.rs

//! Stage -> Step -> CommandRecord telemetry.
//!
//! The tree is append-only within a run. The "current" stage is always the
//! last one and the "current" step is always the last step of that stage;
//! there is no separate cursor to keep in sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Name used for stages/steps that were never explicitly opened.
pub const IMPLICIT_NAME: &str = "Init";

/// Telemetry for one executed external command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRecord {
    pub command: String,
    pub start_time: DateTime<Utc>,
    /// `None` while the command is still running.
    pub elapsed_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl CommandRecord {
    pub fn started(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            start_time: Utc::now(),
            elapsed_seconds: None,
            failed: false,
            output: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed_seconds.is_some()
    }

    /// Seal the record. `failure` carries the captured output of a failed
    /// command. Returns `false` (and changes nothing) if the record was
    /// already sealed.
    pub fn finish(&mut self, elapsed_seconds: f64, failure: Option<String>) -> bool {
        if self.is_finished() {
            warn!(command = %self.command, "command record already finished; ignoring");
            return false;
        }
        self.elapsed_seconds = Some(elapsed_seconds.max(0.0));
        if let Some(output) = failure {
            self.failed = true;
            self.output = Some(output);
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub commands: Vec<CommandRecord>,
}

impl Step {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
        }
    }

    pub fn failed_commands(&self) -> impl Iterator<Item = &CommandRecord> {
        self.commands.iter().filter(|c| c.failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn commands(&self) -> impl Iterator<Item = &CommandRecord> {
        self.steps.iter().flat_map(|s| s.commands.iter())
    }

    pub fn failed_commands(&self) -> impl Iterator<Item = &CommandRecord> {
        self.commands().filter(|c| c.failed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressTree {
    pub stages: Vec<Stage>,
}

impl ProgressTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new top-level phase. Earlier stages are left as they are.
    pub fn stage(&mut self, name: impl Into<String>) -> &mut Stage {
        self.stages.push(Stage::new(name));
        let last = self.stages.len() - 1;
        &mut self.stages[last]
    }

    /// Append a step to the current stage, opening an implicit stage first
    /// if none exists yet.
    pub fn step(&mut self, name: impl Into<String>) -> &mut Step {
        let stage = self.current_stage_mut();
        stage.steps.push(Step::new(name));
        let last = stage.steps.len() - 1;
        &mut stage.steps[last]
    }

    /// Append an already-built step (e.g. one filled by a parallel worker).
    pub fn push_step(&mut self, step: Step) {
        self.current_stage_mut().steps.push(step);
    }

    pub fn current_stage(&self) -> Option<&Stage> {
        self.stages.last()
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.current_stage().and_then(|s| s.steps.last())
    }

    /// The step new commands are recorded into. Always resolves: missing
    /// stage or step are created with [`IMPLICIT_NAME`].
    pub fn current_step_mut(&mut self) -> &mut Step {
        let stage = self.current_stage_mut();
        if stage.steps.is_empty() {
            stage.steps.push(Step::new(IMPLICIT_NAME));
        }
        let last = stage.steps.len() - 1;
        &mut stage.steps[last]
    }

    fn current_stage_mut(&mut self) -> &mut Stage {
        if self.stages.is_empty() {
            self.stages.push(Stage::new(IMPLICIT_NAME));
        }
        let last = self.stages.len() - 1;
        &mut self.stages[last]
    }

    /// Most recently started command anywhere in the tree.
    pub fn last_command(&self) -> Option<&CommandRecord> {
        self.stages
            .iter()
            .rev()
            .flat_map(|s| s.steps.iter().rev())
            .find_map(|step| step.commands.last())
    }

    pub fn last_command_mut(&mut self) -> Option<&mut CommandRecord> {
        self.stages
            .iter_mut()
            .rev()
            .flat_map(|s| s.steps.iter_mut().rev())
            .find_map(|step| step.commands.last_mut())
    }

    /// `(stage, step)` names of every step holding at least one failed
    /// command, in run order.
    pub fn failed_steps(&self) -> Vec<(&str, &str)> {
        self.stages
            .iter()
            .flat_map(|stage| {
                stage
                    .steps
                    .iter()
                    .filter(|step| step.has_failure())
                    .map(move |step| (stage.name.as_str(), step.name.as_str()))
            })
            .collect()
    }
}

/// True iff any command at or below the node failed.
pub trait HasFailure {
    fn has_failure(&self) -> bool;
}

impl HasFailure for CommandRecord {
    fn has_failure(&self) -> bool {
        self.failed
    }
}

impl HasFailure for Step {
    fn has_failure(&self) -> bool {
        self.commands.iter().any(HasFailure::has_failure)
    }
}

impl HasFailure for Stage {
    fn has_failure(&self) -> bool {
        self.steps.iter().any(HasFailure::has_failure)
    }
}

impl HasFailure for ProgressTree {
    fn has_failure(&self) -> bool {
        self.stages.iter().any(HasFailure::has_failure)
    }
}
