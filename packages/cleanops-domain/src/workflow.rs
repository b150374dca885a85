//! Cleaner clock-in workflow: scan, checklist, photos, clock-out.
//!
//! The whole state serializes to JSON so it can be persisted after every step and restored after a
//! reload. Only forward/back stepping is supported; finishing the workflow hands back the visit and
//! the caller resets the state to [`WorkflowState::ClockIn`].

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::qr::QrPayload;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
	Checklist,
	Photos,
	ClockOut,
}
impl Step {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Checklist => "checklist",
			Self::Photos => "photos",
			Self::ClockOut => "clock_out",
		}
	}
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ActiveVisit {
	pub step: Step,
	pub site_id: Uuid,
	pub area_id: Option<Uuid>,
	pub qr_code_id: Uuid,
	#[serde(with = "time::serde::rfc3339")]
	pub clock_in_at: OffsetDateTime,
	#[serde(default)]
	pub completed_task_ids: Vec<Uuid>,
	#[serde(default)]
	pub photo_paths: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum WorkflowState {
	#[default]
	ClockIn,
	Workflow(ActiveVisit),
}

#[derive(Clone, Copy, Debug)]
pub struct WorkflowLimits {
	pub min_photos: u32,
	pub max_photos: u32,
	pub require_all_tasks: bool,
}
impl From<&cleanops_config::Workflow> for WorkflowLimits {
	fn from(cfg: &cleanops_config::Workflow) -> Self {
		Self {
			min_photos: cfg.min_photos,
			max_photos: cfg.max_photos,
			require_all_tasks: cfg.require_all_tasks,
		}
	}
}

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum WorkflowError {
	#[error("Cannot {action} while at the {at} step.")]
	InvalidTransition { at: &'static str, action: &'static str },
	#[error("{remaining} checklist task(s) are still open.")]
	TasksIncomplete { remaining: usize },
	#[error("At least {required} photo(s) are required; {have} uploaded.")]
	NotEnoughPhotos { required: u32, have: usize },
	#[error("No more than {max} photo(s) may be uploaded.")]
	PhotoLimit { max: u32 },
	#[error("Task is not part of this area's checklist.")]
	UnknownTask,
}

type Result<T, E = WorkflowError> = std::result::Result<T, E>;

impl WorkflowState {
	pub fn stage(&self) -> &'static str {
		match self {
			Self::ClockIn => "clock_in",
			Self::Workflow(_) => "workflow",
		}
	}

	/// Step label for display; `clock_in` when no visit is active.
	pub fn position(&self) -> &'static str {
		match self {
			Self::ClockIn => "clock_in",
			Self::Workflow(visit) => visit.step.as_str(),
		}
	}

	pub fn active(&self) -> Option<&ActiveVisit> {
		match self {
			Self::ClockIn => None,
			Self::Workflow(visit) => Some(visit),
		}
	}

	pub fn clock_in(&mut self, payload: &QrPayload, at: OffsetDateTime) -> Result<()> {
		if let Self::Workflow(visit) = self {
			return Err(WorkflowError::InvalidTransition {
				at: visit.step.as_str(),
				action: "clock in",
			});
		}

		*self = Self::Workflow(ActiveVisit {
			step: Step::Checklist,
			site_id: payload.site_id,
			area_id: payload.area_id,
			qr_code_id: payload.code_id,
			clock_in_at: at,
			completed_task_ids: Vec::new(),
			photo_paths: Vec::new(),
		});

		Ok(())
	}

	/// Marks a checklist task done. `checklist` is the set of task ids the area defines.
	pub fn complete_task(&mut self, task_id: Uuid, checklist: &[Uuid]) -> Result<()> {
		let visit = self.visit_at(Step::Checklist, "complete a task")?;

		if !checklist.contains(&task_id) {
			return Err(WorkflowError::UnknownTask);
		}
		if !visit.completed_task_ids.contains(&task_id) {
			visit.completed_task_ids.push(task_id);
		}

		Ok(())
	}

	pub fn reopen_task(&mut self, task_id: Uuid) -> Result<()> {
		let visit = self.visit_at(Step::Checklist, "reopen a task")?;

		visit.completed_task_ids.retain(|id| *id != task_id);

		Ok(())
	}

	pub fn add_photo(&mut self, path: String, limits: WorkflowLimits) -> Result<()> {
		let visit = self.visit_at(Step::Photos, "upload a photo")?;

		if visit.photo_paths.len() >= limits.max_photos as usize {
			return Err(WorkflowError::PhotoLimit { max: limits.max_photos });
		}

		visit.photo_paths.push(path);

		Ok(())
	}

	pub fn advance(&mut self, checklist: &[Uuid], limits: WorkflowLimits) -> Result<Step> {
		let Self::Workflow(visit) = self else {
			return Err(WorkflowError::InvalidTransition { at: "clock_in", action: "advance" });
		};
		let next = match visit.step {
			Step::Checklist => {
				check_tasks(visit, checklist, limits)?;

				Step::Photos
			},
			Step::Photos => {
				check_photos(visit, limits)?;

				Step::ClockOut
			},
			Step::ClockOut =>
				return Err(WorkflowError::InvalidTransition { at: "clock_out", action: "advance" }),
		};

		visit.step = next;

		Ok(next)
	}

	pub fn back(&mut self) -> Result<Step> {
		let Self::Workflow(visit) = self else {
			return Err(WorkflowError::InvalidTransition { at: "clock_in", action: "go back" });
		};
		let previous = match visit.step {
			Step::Checklist =>
				return Err(WorkflowError::InvalidTransition { at: "checklist", action: "go back" }),
			Step::Photos => Step::Checklist,
			Step::ClockOut => Step::Photos,
		};

		visit.step = previous;

		Ok(previous)
	}

	/// Validates the visit is complete and resets the state, returning the finished visit.
	pub fn finish(&mut self, checklist: &[Uuid], limits: WorkflowLimits) -> Result<ActiveVisit> {
		let visit = self.visit_at(Step::ClockOut, "clock out")?;

		check_tasks(visit, checklist, limits)?;
		check_photos(visit, limits)?;

		let finished = visit.clone();

		*self = Self::ClockIn;

		Ok(finished)
	}

	fn visit_at(&mut self, step: Step, action: &'static str) -> Result<&mut ActiveVisit> {
		match self {
			Self::Workflow(visit) =>
				if visit.step == step {
					Ok(visit)
				} else {
					Err(WorkflowError::InvalidTransition { at: visit.step.as_str(), action })
				},
			Self::ClockIn => Err(WorkflowError::InvalidTransition { at: "clock_in", action }),
		}
	}
}

fn check_tasks(visit: &ActiveVisit, checklist: &[Uuid], limits: WorkflowLimits) -> Result<()> {
	if !limits.require_all_tasks {
		return Ok(());
	}

	let remaining = checklist.iter().filter(|id| !visit.completed_task_ids.contains(*id)).count();

	if remaining > 0 {
		return Err(WorkflowError::TasksIncomplete { remaining });
	}

	Ok(())
}

fn check_photos(visit: &ActiveVisit, limits: WorkflowLimits) -> Result<()> {
	if visit.photo_paths.len() < limits.min_photos as usize {
		return Err(WorkflowError::NotEnoughPhotos {
			required: limits.min_photos,
			have: visit.photo_paths.len(),
		});
	}

	Ok(())
}
