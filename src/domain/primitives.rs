//! Strongly-typed primitive values shared across the control plane.
//!
//! Primitive obsession (bare `String`/`u32` for VNIs, DSCP marks, priorities,
//! cluster names, ...) is the easiest way to let an invalid value slip past
//! validation into a derived config. Every bounded or pattern-constrained
//! scalar from the data model is wrapped here with `nutype` so construction
//! itself is the validation point.

use nutype::nutype;

/// Name of a cluster, as registered with the [`crate::agent_registry::AgentRegistry`].
#[nutype(
    validate(len_char_min = 1, len_char_max = 253),
    derive(
        Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
        AsRef, Into
    )
)]
pub struct ClusterName(String);

/// Identifier of a slice, unique across the lifetime of the manager.
#[nutype(
    validate(len_char_min = 1, len_char_max = 128),
    derive(
        Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
        AsRef, Into
    )
)]
pub struct SliceId(String);

/// VXLAN Network Identifier. Valid range is `[1, 16_777_215]` (24 bits, `0`
/// reserved).
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 16_777_215),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, Into)
)]
pub struct Vni(u32);

/// DSCP (Differentiated Services Code Point) marking, 6 bits wide.
#[nutype(
    validate(greater_or_equal = 0, less_or_equal = 63),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, Into)
)]
pub struct Dscp(i16);

/// A 0-10 priority used both for traffic classes and queue configs.
#[nutype(
    validate(greater_or_equal = 0, less_or_equal = 10),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, Into)
)]
pub struct Priority(u8);

/// Non-negative millisecond latency target. Strategy validation requires `> 0`;
/// traffic-class latency budgets may be `0` (meaning "no budget set").
#[nutype(
    validate(greater_or_equal = 0.0),
    derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, Display, Into)
)]
pub struct LatencyMs(f64);

/// Non-negative queue weight.
#[nutype(
    validate(greater_or_equal = 0.0),
    derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, Display, Into)
)]
pub struct Weight(f64);

impl Vni {
    /// The inclusive lower bound of a valid VNI.
    pub const MIN: u32 = 1;
    /// The inclusive upper bound of a valid VNI (24 bits).
    pub const MAX: u32 = 16_777_215;
}
