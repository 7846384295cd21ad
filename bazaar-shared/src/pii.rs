use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wrapper for recipient contact data (phone numbers, street addresses) that
/// hides the value in `Debug`/`Display` output so it cannot leak through
/// `tracing` macros. Serialization still emits the real value, since API
/// responses and carrier requests need it.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct Masked<T>(pub T);

impl<T: fmt::Display> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}")
    }
}

impl<T: fmt::Display> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn into_inner(self) -> T {
        self.0
    }

    pub fn inner(&self) -> &T {
        &self.0
    }
}

impl<T> From<T> for Masked<T> {
    fn from(value: T) -> Self {
        Masked(value)
    }
}
