//! Response delay resolution.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Delay declared on a variant.
///
/// In definitions an absent `delay` inherits the route delay, `null` uses the
/// global delay and a number (including `0`) is used as is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DelaySetting {
    #[default]
    Inherit,
    Global,
    Fixed(u64),
}

impl DelaySetting {
    pub fn is_inherit(&self) -> bool {
        matches!(self, DelaySetting::Inherit)
    }
}

impl<'de> Deserialize<'de> for DelaySetting {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Absent fields never reach here: they take the default (Inherit)
        Ok(Option::<u64>::deserialize(deserializer)?
            .map_or(DelaySetting::Global, DelaySetting::Fixed))
    }
}

impl Serialize for DelaySetting {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DelaySetting::Fixed(ms) => serializer.serialize_u64(*ms),
            DelaySetting::Inherit | DelaySetting::Global => serializer.serialize_none(),
        }
    }
}

/// Milliseconds to wait before responding.
pub fn resolve_delay(variant: DelaySetting, route: Option<u64>, global: u64) -> u64 {
    match variant {
        DelaySetting::Fixed(ms) => ms,
        DelaySetting::Global => global,
        DelaySetting::Inherit => route.unwrap_or(global),
    }
}
