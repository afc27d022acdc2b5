//! Property tests: the approval policy only ever tightens a plan.

use mission_risk::RiskModel;
use mission_types::{ActionType, Confidence, ExecutionStep, RiskLevel};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_action() -> impl Strategy<Value = ActionType> {
    prop_oneof![
        Just(ActionType::Navigate),
        Just(ActionType::Click),
        Just(ActionType::Type),
        Just(ActionType::Extract),
        Just(ActionType::Decide),
        Just(ActionType::Wait),
        Just(ActionType::Compose),
        Just(ActionType::Update),
    ]
}

fn arb_confidence() -> impl Strategy<Value = Confidence> {
    prop_oneof![
        Just(Confidence::High),
        Just(Confidence::Medium),
        Just(Confidence::Low),
    ]
}

fn arb_step() -> impl Strategy<Value = ExecutionStep> {
    (
        "[a-z]{1,8}",
        prop_oneof![
            Just("Open page"),
            Just("Delete record"),
            Just("Submit form"),
            Just("Read total"),
        ],
        arb_action(),
        arb_confidence(),
        0u64..120,
        any::<bool>(),
    )
        .prop_map(|(id, name, action, confidence, secs, approval)| {
            let mut step = ExecutionStep::new(id, name, action, confidence, secs);
            step.requires_approval = approval;
            step
        })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    /// Enforcement never clears an approval flag and always covers
    /// low-confidence and irreversible steps.
    #[test]
    fn enforcement_only_raises(steps in prop::collection::vec(arb_step(), 0..12)) {
        let model = RiskModel::default();
        let mut enforced = steps.clone();
        model.enforce_approvals(&mut enforced);

        for (before, after) in steps.iter().zip(&enforced) {
            prop_assert!(!before.requires_approval || after.requires_approval);
            if after.confidence == Confidence::Low || model.is_irreversible(after) {
                prop_assert!(after.requires_approval);
            }
        }
    }

    /// Scores stay in range and every recorded factor comes with a mitigation.
    #[test]
    fn assessment_is_bounded(steps in prop::collection::vec(arb_step(), 0..24)) {
        let model = RiskModel::default();
        let score = model.score(&steps);
        prop_assert!((0.0..=1.0).contains(&score));

        let assessment = model.assess(&steps);
        prop_assert_eq!(
            assessment.risk_factors.is_empty(),
            assessment.mitigation_strategies.is_empty()
        );
        if assessment.risk_factors.is_empty() {
            prop_assert_eq!(assessment.overall_risk, RiskLevel::Low);
        }
    }
}
