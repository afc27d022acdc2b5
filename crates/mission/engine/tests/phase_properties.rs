//! Property tests for phase ordering, retry bounds and terminal rejection

mod common;

use common::*;
use mission_engine::EngineConfig;
use mission_types::{ActionType, AuditEventKind, Mission, MissionStatus, PhaseId};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

const ACTIONS: [ActionType; 5] = [
    ActionType::Navigate,
    ActionType::Type,
    ActionType::Extract,
    ActionType::Decide,
    ActionType::Update,
];

#[derive(Debug, Clone)]
struct PhaseCase {
    action: usize,
    steps: usize,
    /// Attempts on which the phase's last step fails
    failures: u32,
    gated: bool,
}

fn phase_case() -> impl Strategy<Value = PhaseCase> {
    (0..ACTIONS.len(), 1usize..4, 0u32..5, any::<bool>()).prop_map(
        |(action, steps, failures, gated)| PhaseCase {
            action,
            steps,
            failures,
            gated,
        },
    )
}

#[derive(Debug, Clone)]
struct MissionCase {
    phases: Vec<PhaseCase>,
    max_retries: u32,
    oversight: bool,
    approve: bool,
}

fn mission_case() -> impl Strategy<Value = MissionCase> {
    (
        prop::collection::vec(phase_case(), 1..6),
        0u32..4,
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(phases, max_retries, oversight, approve)| MissionCase {
            phases,
            max_retries,
            oversight,
            approve,
        })
}

fn run_case(case: &MissionCase) -> Mission {
    // Neighbouring phases need different actions or they would merge.
    let mut specs = Vec::new();
    let mut previous = None;
    for phase in &case.phases {
        let mut action = phase.action;
        if previous == Some(action) {
            action = (action + 1) % ACTIONS.len();
        }
        previous = Some(action);
        let spec = PhaseSpec::new(ACTIONS[action], phase.steps);
        specs.push(if phase.gated { spec.gated() } else { spec });
    }
    let plan = plan_of(&specs);

    let mut agent = FlakyAgent::reliable();
    for (p, phase) in case.phases.iter().enumerate() {
        agent = agent.failing(&format!("p{}-s{}", p, phase.steps - 1), phase.failures);
    }
    let approvals = if case.approve {
        ScriptedApprover::approving()
    } else {
        ScriptedApprover::rejecting()
    };
    let engine = orchestrator(
        EngineConfig::default(),
        Arc::new(agent),
        approvals,
        memory_log(),
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime
        .block_on(engine.execute_mission(Arc::new(plan), case.oversight, case.max_retries))
        .unwrap()
}

fn phase_position(mission: &Mission, id: &PhaseId) -> usize {
    mission
        .phases
        .iter()
        .position(|p| &p.id == id)
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn phases_never_overlap(case in mission_case()) {
        let mission = run_case(&case);
        let trail = &mission.audit_trail;

        for pair in trail.windows(2) {
            prop_assert!(pair[0].sequence < pair[1].sequence);
            prop_assert!(pair[0].timestamp <= pair[1].timestamp);
        }

        // Once a later phase has an event, no earlier phase gets another.
        let mut highest = 0usize;
        for event in trail {
            let phase = event.phase_id.as_ref().unwrap();
            let position = phase_position(&mission, phase);
            prop_assert!(position >= highest);
            highest = position;
        }
    }

    #[test]
    fn retries_stay_within_budget(case in mission_case()) {
        let mission = run_case(&case);

        let mut retried: HashMap<&PhaseId, u32> = HashMap::new();
        for event in &mission.audit_trail {
            if event.kind == AuditEventKind::Retried {
                *retried.entry(event.phase_id.as_ref().unwrap()).or_default() += 1;
            }
        }
        for (phase, count) in &retried {
            prop_assert!(*count <= case.max_retries);
            let outcome = &mission.results[*phase];
            prop_assert!(outcome.attempts <= case.max_retries + 1);
        }
        if mission.status == MissionStatus::Completed {
            prop_assert_eq!(mission.results.len(), mission.phases.len());
        }
    }

    #[test]
    fn rejection_ends_the_mission(case in mission_case()) {
        let mission = run_case(&case);
        let trail = &mission.audit_trail;

        let rejected = trail
            .iter()
            .position(|e| e.kind == AuditEventKind::CheckpointRejected);
        if let Some(at) = rejected {
            let phase = trail[at].phase_id.clone().unwrap();
            prop_assert_eq!(mission.status, MissionStatus::Failed);
            prop_assert!(trail[at..].iter().all(|e| e.phase_id.as_ref() == Some(&phase)));
            prop_assert_eq!(trail.last().unwrap().kind, AuditEventKind::Failed);
            prop_assert!(!case.approve && case.oversight);
        }
        if !case.oversight {
            prop_assert!(trail.iter().all(|e| e.kind != AuditEventKind::CheckpointRequested));
        }
    }
}
