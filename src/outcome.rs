use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Result of a mutating step: whether it had to change anything to converge.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Outcome {
    Changed,
    #[default]
    Unchanged,
}

impl Outcome {
    pub fn is_changed(self) -> bool {
        self == Outcome::Changed
    }

    /// The token printed on stdout for the automation layer.
    pub fn token(self) -> &'static str {
        match self {
            Outcome::Changed => "s_changed",
            Outcome::Unchanged => "s_unchanged",
        }
    }
}

impl BitOr for Outcome {
    type Output = Outcome;

    fn bitor(self, rhs: Outcome) -> Outcome {
        if self.is_changed() || rhs.is_changed() {
            Outcome::Changed
        } else {
            Outcome::Unchanged
        }
    }
}

impl BitOrAssign for Outcome {
    fn bitor_assign(&mut self, rhs: Outcome) {
        *self = *self | rhs;
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}
