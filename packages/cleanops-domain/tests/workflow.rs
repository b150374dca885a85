use time::macros::datetime;
use uuid::Uuid;

use cleanops_domain::{
	qr::{QrKind, QrPayload},
	workflow::{Step, WorkflowError, WorkflowLimits, WorkflowState},
};

fn limits() -> WorkflowLimits {
	WorkflowLimits { min_photos: 1, max_photos: 2, require_all_tasks: true }
}

fn area_payload() -> QrPayload {
	QrPayload {
		kind: QrKind::Area,
		code_id: Uuid::new_v4(),
		site_id: Uuid::new_v4(),
		area_id: Some(Uuid::new_v4()),
	}
}

#[test]
fn clock_in_moves_to_workflow_and_survives_reload() {
	let payload = area_payload();
	let mut state = WorkflowState::default();

	assert_eq!(state.stage(), "clock_in");

	state.clock_in(&payload, datetime!(2024-06-03 08:00 UTC)).expect("Clock-in must succeed.");

	assert_eq!(state.stage(), "workflow");
	assert_eq!(state.position(), "checklist");

	let stored = serde_json::to_value(&state).expect("Failed to serialize state.");

	assert_eq!(stored["stage"], "workflow");

	let reloaded: WorkflowState =
		serde_json::from_value(stored).expect("Failed to deserialize state.");

	assert_eq!(reloaded, state);
	assert_eq!(reloaded.active().map(|visit| visit.area_id), Some(payload.area_id));
}

#[test]
fn clocking_in_twice_is_rejected() {
	let mut state = WorkflowState::default();

	state.clock_in(&area_payload(), datetime!(2024-06-03 08:00 UTC)).expect("First clock-in.");

	let err = state
		.clock_in(&area_payload(), datetime!(2024-06-03 08:05 UTC))
		.expect_err("Second clock-in must fail.");

	assert_eq!(err, WorkflowError::InvalidTransition { at: "checklist", action: "clock in" });
}

#[test]
fn full_walkthrough_resets_to_clock_in() {
	let checklist = [Uuid::new_v4(), Uuid::new_v4()];
	let mut state = WorkflowState::default();

	state.clock_in(&area_payload(), datetime!(2024-06-03 08:00 UTC)).expect("Clock-in.");

	assert_eq!(
		state.advance(&checklist, limits()),
		Err(WorkflowError::TasksIncomplete { remaining: 2 })
	);

	for task in checklist {
		state.complete_task(task, &checklist).expect("Task completion.");
	}

	assert_eq!(state.advance(&checklist, limits()), Ok(Step::Photos));
	assert_eq!(
		state.advance(&checklist, limits()),
		Err(WorkflowError::NotEnoughPhotos { required: 1, have: 0 })
	);

	state.add_photo("photos/a.jpg".to_string(), limits()).expect("First photo.");
	state.add_photo("photos/b.jpg".to_string(), limits()).expect("Second photo.");

	assert_eq!(
		state.add_photo("photos/c.jpg".to_string(), limits()),
		Err(WorkflowError::PhotoLimit { max: 2 })
	);
	assert_eq!(state.advance(&checklist, limits()), Ok(Step::ClockOut));

	let visit = state.finish(&checklist, limits()).expect("Finish must succeed.");

	assert_eq!(visit.photo_paths.len(), 2);
	assert_eq!(visit.completed_task_ids.len(), 2);
	assert_eq!(state, WorkflowState::ClockIn);
}

#[test]
fn back_steps_toward_checklist_and_stops_there() {
	let checklist = [Uuid::new_v4()];
	let mut state = WorkflowState::default();

	state.clock_in(&area_payload(), datetime!(2024-06-03 08:00 UTC)).expect("Clock-in.");
	state.complete_task(checklist[0], &checklist).expect("Task completion.");
	state.advance(&checklist, limits()).expect("Advance to photos.");

	assert_eq!(state.back(), Ok(Step::Checklist));
	assert_eq!(
		state.back(),
		Err(WorkflowError::InvalidTransition { at: "checklist", action: "go back" })
	);
}

#[test]
fn unknown_tasks_and_misplaced_actions_are_rejected() {
	let checklist = [Uuid::new_v4()];
	let mut state = WorkflowState::default();

	assert_eq!(
		state.add_photo("photos/a.jpg".to_string(), limits()),
		Err(WorkflowError::InvalidTransition { at: "clock_in", action: "upload a photo" })
	);

	state.clock_in(&area_payload(), datetime!(2024-06-03 08:00 UTC)).expect("Clock-in.");

	assert_eq!(state.complete_task(Uuid::new_v4(), &checklist), Err(WorkflowError::UnknownTask));
	assert_eq!(
		state.finish(&checklist, limits()).map(|_| ()),
		Err(WorkflowError::InvalidTransition { at: "checklist", action: "clock out" })
	);
}

#[test]
fn step_errors_name_the_current_step() {
	let checklist = [Uuid::new_v4()];
	let mut state = WorkflowState::default();

	state.clock_in(&area_payload(), datetime!(2024-06-03 08:00 UTC)).expect("Clock-in.");

	assert_eq!(
		state.add_photo("photos/a.jpg".to_string(), limits()),
		Err(WorkflowError::InvalidTransition { at: "checklist", action: "upload a photo" })
	);

	state.complete_task(checklist[0], &checklist).expect("Task completion.");
	state.advance(&checklist, limits()).expect("Advance to photos.");
	state.add_photo("photos/a.jpg".to_string(), limits()).expect("Photo in the photos step.");

	assert_eq!(
		state.complete_task(checklist[0], &checklist),
		Err(WorkflowError::InvalidTransition { at: "photos", action: "complete a task" })
	);
}

#[test]
fn optional_checklist_allows_skipping_tasks() {
	let checklist = [Uuid::new_v4()];
	let relaxed = WorkflowLimits { min_photos: 0, max_photos: 1, require_all_tasks: false };
	let mut state = WorkflowState::default();

	state.clock_in(&area_payload(), datetime!(2024-06-03 08:00 UTC)).expect("Clock-in.");

	assert_eq!(state.advance(&checklist, relaxed), Ok(Step::Photos));
	assert_eq!(state.advance(&checklist, relaxed), Ok(Step::ClockOut));
	assert!(state.finish(&checklist, relaxed).is_ok());
}
