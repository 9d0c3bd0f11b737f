// src/report/dashboard.rs

//! Projection of a run onto a flat list of status-board units.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::progress::{CommandRecord, HasFailure, ProgressTree, Stage, Step};
use crate::sync::ChangeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Red,
    Green,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    Run,
    Wait,
}

/// One named unit on the status board.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUnit {
    pub name: String,
    pub status: UnitStatus,
    pub doing: Activity,
    pub lastupdate: DateTime<Utc>,
    pub failed_tasks: Vec<String>,
    pub current_task: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusProjection {
    pub project: String,
    pub lastupdate: DateTime<Utc>,
    pub clients: Vec<StatusUnit>,
    /// Upstream changes picked up by this run.
    #[serde(skip_serializing_if = "ChangeSet::is_empty")]
    pub changes: ChangeSet,
}

/// How finely each stage is reported.
#[derive(Debug, Clone, Default)]
pub struct Granularity {
    /// Stages reported as one unit per step; all others get one unit.
    detailed: BTreeSet<String>,
}

impl Granularity {
    pub fn per_stage() -> Self {
        Self::default()
    }

    pub fn detailed<I, S>(stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            detailed: stages.into_iter().map(Into::into).collect(),
        }
    }

    fn is_detailed(&self, stage: &str) -> bool {
        self.detailed.contains(stage)
    }
}

/// Build the status projection.
///
/// `in_progress` marks the unit holding the latest command as running;
/// every other unit is waiting.
pub fn export(
    project: &str,
    tree: &ProgressTree,
    changes: &ChangeSet,
    granularity: &Granularity,
    in_progress: bool,
) -> StatusProjection {
    let now = Utc::now();
    let mut clients = Vec::new();

    for stage in tree.stages.iter() {
        if granularity.is_detailed(&stage.name) {
            clients.extend(
                stage
                    .steps
                    .iter()
                    .map(|step| step_unit(stage, step, now)),
            );
        } else {
            clients.push(stage_unit(stage, now));
        }
    }

    if in_progress {
        if let Some(running) = clients.iter_mut().rev().find(|u| !u.current_task.is_empty()) {
            running.doing = Activity::Run;
        }
    }

    StatusProjection {
        project: project.to_string(),
        lastupdate: now,
        clients,
        changes: changes.clone(),
    }
}

fn stage_unit(stage: &Stage, now: DateTime<Utc>) -> StatusUnit {
    build_unit(
        stage.name.clone(),
        stage.has_failure(),
        stage.commands(),
        now,
    )
}

fn step_unit(stage: &Stage, step: &Step, now: DateTime<Utc>) -> StatusUnit {
    build_unit(
        format!("{}: {}", stage.name, step.name),
        step.has_failure(),
        step.commands.iter(),
        now,
    )
}

fn build_unit<'a>(
    name: String,
    failed: bool,
    commands: impl Iterator<Item = &'a CommandRecord>,
    now: DateTime<Utc>,
) -> StatusUnit {
    let mut failed_tasks = Vec::new();
    let mut last: Option<&CommandRecord> = None;
    for command in commands {
        if command.failed {
            failed_tasks.push(command.command.clone());
        }
        last = Some(command);
    }

    StatusUnit {
        name,
        status: if failed { UnitStatus::Red } else { UnitStatus::Green },
        doing: Activity::Wait,
        lastupdate: last.map(|c| c.start_time).unwrap_or(now),
        failed_tasks,
        current_task: last.map(|c| c.command.clone()).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(command: &str, failed: bool) -> CommandRecord {
        let mut r = CommandRecord::started(command);
        r.finish(0.5, failed.then(|| "output".to_string()));
        r
    }

    fn sample_tree() -> ProgressTree {
        let mut tree = ProgressTree::new();
        tree.stage("Deploy");
        tree.step("Link addons").commands.push(record("./tools/link_addons.sh", false));
        tree.step("Restore").commands.push(record("createdb erp", true));
        tree.stage("Testing");
        tree.step("erp").commands.push(record("./run_tests.sh", false));
        tree.step("plantmeter").commands.push(record("nosetests", true));
        tree
    }

    #[test]
    fn one_unit_per_stage_by_default() {
        let tree = sample_tree();
        let projection = export("erp", &tree, &ChangeSet::new(), &Granularity::per_stage(), false);

        assert_eq!(projection.clients.len(), 2);
        let deploy = &projection.clients[0];
        assert_eq!(deploy.name, "Deploy");
        assert_eq!(deploy.status, UnitStatus::Red);
        assert_eq!(deploy.failed_tasks, vec!["createdb erp".to_string()]);
        assert_eq!(deploy.current_task, "createdb erp");
        assert!(projection.clients.iter().all(|u| u.doing == Activity::Wait));
    }

    #[test]
    fn detailed_stages_report_each_step() {
        let tree = sample_tree();
        let projection = export(
            "erp",
            &tree,
            &ChangeSet::new(),
            &Granularity::detailed(["Testing"]),
            false,
        );

        let names: Vec<_> = projection.clients.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Deploy", "Testing: erp", "Testing: plantmeter"]);
        assert_eq!(projection.clients[1].status, UnitStatus::Green);
        assert!(projection.clients[1].failed_tasks.is_empty());
        assert_eq!(projection.clients[2].status, UnitStatus::Red);
        assert_eq!(projection.clients[2].failed_tasks, vec!["nosetests".to_string()]);
    }

    #[test]
    fn in_progress_run_marks_latest_unit_running() {
        let tree = sample_tree();
        let projection = export("erp", &tree, &ChangeSet::new(), &Granularity::per_stage(), true);
        assert_eq!(projection.clients[0].doing, Activity::Wait);
        assert_eq!(projection.clients[1].doing, Activity::Run);
    }

    #[test]
    fn json_uses_dashboard_field_names() {
        let tree = sample_tree();
        let mut changes = ChangeSet::new();
        changes.insert_cloned("alpha");
        let projection = export("erp", &tree, &changes, &Granularity::per_stage(), false);
        let json = serde_json::to_value(&projection).unwrap();

        assert_eq!(json["project"], "erp");
        assert!(json["lastupdate"].is_string());
        let unit = &json["clients"][0];
        assert_eq!(unit["status"], "red");
        assert_eq!(unit["doing"], "wait");
        assert_eq!(unit["failedTasks"][0], "createdb erp");
        assert_eq!(unit["currentTask"], "createdb erp");
        assert!(unit["lastupdate"].is_string());
        assert_eq!(json["changes"]["alpha"], "cloned");
    }
}
