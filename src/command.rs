//! Command wire records.
//!
//! Both transports carry the same serialized record: one JSON object per
//! helper stdin line, or per wireless datagram. The tag field dispatches the
//! command kind on the receiving controller.

use serde::{Deserialize, Serialize};

/// A command addressed to one physical node.
///
/// `Set.channel` is node-local and 1-based; the dispatcher translates from
/// global universe channels before building the record. `Effect.channel` and
/// `Effect.count` are informational payload for the receiving controller to
/// interpret, not a targeting filter on this side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Command {
    Set {
        channel: u16,
        value: u8,
    },
    Blackout,
    Effect {
        name: String,
        channel: u16,
        count: u32,
        speed: f32,
    },
}

impl Command {
    /// Serialize to the single-line wire form (no trailing newline; the
    /// helper bridge appends the line terminator itself).
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Caller-supplied effect parameters; absent fields take the protocol
/// defaults when the `Effect` record is built.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EffectParams {
    pub start_channel: Option<u16>,
    pub count: Option<u32>,
    pub speed: Option<f32>,
}

impl EffectParams {
    pub(crate) const DEFAULT_CHANNEL: u16 = 1;
    pub(crate) const DEFAULT_COUNT: u32 = 50;
    pub(crate) const DEFAULT_SPEED: f32 = 1.0;
}
