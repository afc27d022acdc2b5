//! Identifiers shared across planning, execution and audit.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id!(
    /// Identity of an execution plan. A re-plan always produces a new one.
    WorkflowId
);

string_id!(
    /// Identity of a single mission run
    MissionId
);

string_id!(
    /// Identity of a phase within a mission
    PhaseId
);

string_id!(
    /// Identity of a step, unique within its plan
    StepId
);

string_id!(
    /// Caller-supplied job correlation id
    JobId
);

impl From<&JobId> for MissionId {
    /// Planning events are recorded under the job they were produced for.
    fn from(job: &JobId) -> Self {
        MissionId(job.0.clone())
    }
}
