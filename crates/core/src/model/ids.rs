use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for parsing an ID from a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            #[must_use]
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the underlying u64 value
            #[must_use]
            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u64>().map(Self::new).map_err(|_| ParseIdError {
                    kind: stringify!($name),
                })
            }
        }
    };
}

entity_id!(
    /// Unique identifier for a User (learner, teacher or admin)
    UserId
);
entity_id!(
    /// Unique identifier for a Course
    CourseId
);
entity_id!(
    /// Unique identifier for a Unit within a course
    UnitId
);
entity_id!(
    /// Unique identifier for a Topic within a unit
    TopicId
);
entity_id!(
    /// Unique identifier for a Task within a topic
    TaskId
);
entity_id!(
    /// Unique identifier for an Enrollment
    EnrollmentId
);
entity_id!(
    /// Unique identifier for a completed-task fact
    CompletedTaskId
);

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_id_display() {
        let id = CourseId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(format!("{id:?}"), "CourseId(42)");
    }

    #[test]
    fn task_id_from_str_accepts_surrounding_whitespace() {
        let id: TaskId = " 123 ".parse().unwrap();
        assert_eq!(id, TaskId::new(123));
    }

    #[test]
    fn enrollment_id_from_str_invalid() {
        let err = "not-a-number".parse::<EnrollmentId>().unwrap_err();
        assert_eq!(err.to_string(), "failed to parse EnrollmentId from string");
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&UnitId::new(7)).unwrap();
        assert_eq!(json, "7");
        let back: UnitId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, UnitId::new(7));
    }

    #[test]
    fn string_and_numeric_forms_resolve_to_same_id() {
        let parsed: CourseId = "9".parse().unwrap();
        assert_eq!(parsed, CourseId::new(9));
    }
}
