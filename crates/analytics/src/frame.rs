use std::fmt;

use serde::{Deserialize, Serialize};

/// Status used when a track carries none.
pub const DEFAULT_STATUS: &str = "unknown";

/// Area name used when a track is not inside any monitored area.
pub const DEFAULT_AREA_NAME: &str = "unassigned";

/// Area type used when the service does not classify the area.
pub const DEFAULT_AREA_TYPE: &str = "unknown";

/// Frame index of an analytics snapshot.
///
/// Zero is a valid index, so a missing index is represented explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameIndex {
    Known(u64),
    Unknown,
}

impl Serialize for FrameIndex {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Known(i) => s.serialize_u64(*i),
            Self::Unknown => s.serialize_str("unknown"),
        }
    }
}

impl<'de> Deserialize<'de> for FrameIndex {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Index(u64),
            Marker(String),
        }

        match Repr::deserialize(d)? {
            Repr::Index(i) => Ok(Self::Known(i)),
            Repr::Marker(m) if m == "unknown" => Ok(Self::Unknown),
            Repr::Marker(m) => Err(serde::de::Error::custom(format!(
                "invalid frame index marker: {m}"
            ))),
        }
    }
}

impl FrameIndex {
    pub fn as_option(self) -> Option<u64> {
        match self {
            Self::Known(i) => Some(i),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(i) => write!(f, "{i}"),
            Self::Unknown => f.write_str("?"),
        }
    }
}

/// Which raw schema a frame was normalized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceVariant {
    /// Per-object tracks keyed by id.
    Tracks,
    /// Lane descriptors with aggregate statistics.
    Lanes,
    /// Neither shape was recognized.
    Unrecognized,
}

/// Area a track was matched to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub area_type: String,
}

impl Default for AreaDescriptor {
    fn default() -> Self {
        Self {
            name: DEFAULT_AREA_NAME.into(),
            area_type: DEFAULT_AREA_TYPE.into(),
        }
    }
}

/// Summary of a single tracked object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub id: String,
    pub status: String,
    pub area: AreaDescriptor,
}

/// Normalized analytics snapshot.
///
/// `object_count` is reported by the service and may exceed
/// `objects.len()` for lane-oriented payloads, which only carry an
/// aggregate count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsFrame {
    pub frame_index: FrameIndex,
    pub object_count: usize,
    pub objects: Vec<TrackSummary>,
    /// Number of lanes described (lane-oriented payloads only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lane_count: Option<usize>,
    pub source_variant: SourceVariant,
}

impl AnalyticsFrame {
    /// An empty frame for payloads in an unrecognized shape.
    pub fn unrecognized(frame_index: FrameIndex) -> Self {
        Self {
            frame_index,
            object_count: 0,
            objects: Vec::new(),
            lane_count: None,
            source_variant: SourceVariant::Unrecognized,
        }
    }
}
