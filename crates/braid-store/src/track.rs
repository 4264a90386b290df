use serde::{Deserialize, Serialize};

use braid_core::identity::Caller;

/// Storage partition discriminant. Authenticated users' data lives on the
/// permanent track; anonymous users' data on the temporary track until
/// promotion. Both tracks share one generic repository implementation —
/// the track only selects the table pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    Permanent,
    Temporary,
}

impl Track {
    pub fn for_caller(caller: &Caller) -> Self {
        match caller {
            Caller::User(_) => Self::Permanent,
            Caller::Anonymous(_) => Self::Temporary,
        }
    }

    pub fn threads_table(&self) -> &'static str {
        match self {
            Self::Permanent => "threads",
            Self::Temporary => "temporary_threads",
        }
    }

    pub fn messages_table(&self) -> &'static str {
        match self {
            Self::Permanent => "messages",
            Self::Temporary => "temporary_messages",
        }
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Permanent => write!(f, "permanent"),
            Self::Temporary => write!(f, "temporary"),
        }
    }
}
