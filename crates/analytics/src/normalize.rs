//! Shape detection and normalization of analytics payloads.
//!
//! Two raw shapes are understood:
//!
//! - **tracks**: `{"frame_index": 5, "tracks": {"<id>": {"status": ..,
//!   "parking_area": {"area_name": .., "area_type": ..}}}}`
//! - **lanes**: `{"lanes": [..], "stats": {"occupied_lanes": 1}}` with the
//!   frame index under `frame_idx`
//!
//! The shape is detected structurally. When both a track map and a lane
//! sequence are present the track shape wins, as it is the more specific
//! of the two.
//!
//! A serialized [`AnalyticsFrame`] is also accepted and read back as-is,
//! so normalizing an already normalized frame is a no-op.

use serde_json::{Map, Value};
use tracing::trace;

use detstream_protocol::ControlMessage;
use detstream_protocol::fields::{self, LANE_FRAME_INDEX_KEYS, TRACK_FRAME_INDEX_KEYS};

use crate::frame::{
    AnalyticsFrame, AreaDescriptor, DEFAULT_AREA_NAME, DEFAULT_AREA_TYPE, DEFAULT_STATUS,
    FrameIndex, SourceVariant, TrackSummary,
};

const TRACKS_KEY: &str = "tracks";
const LANES_KEY: &str = "lanes";
const STATS_KEY: &str = "stats";
const OCCUPIED_LANES_KEY: &str = "occupied_lanes";
const STATUS_KEYS: &[&str] = &["status"];
const AREA_KEYS: &[&str] = &["parking_area"];
const AREA_NAME_KEYS: &[&str] = &["area_name"];
const AREA_TYPE_KEYS: &[&str] = &["area_type"];
const OBJECTS_KEY: &str = "objects";
const SOURCE_VARIANT_KEY: &str = "source_variant";

/// Raw shape detected in a payload body.
#[derive(Debug)]
enum Shape<'a> {
    Tracks(&'a Map<String, Value>),
    Lanes {
        lanes: &'a [Value],
        stats: Option<&'a Map<String, Value>>,
    },
    Normalized(AnalyticsFrame),
    Unrecognized,
}

/// Detects the payload shape, in fixed precedence order.
fn detect(body: &Map<String, Value>) -> Shape<'_> {
    if let Some(tracks) = body.get(TRACKS_KEY).and_then(Value::as_object) {
        return Shape::Tracks(tracks);
    }
    if let Some(lanes) = body.get(LANES_KEY).and_then(Value::as_array) {
        return Shape::Lanes {
            lanes,
            stats: body.get(STATS_KEY).and_then(Value::as_object),
        };
    }
    if body.get(OBJECTS_KEY).is_some_and(Value::is_array) && body.contains_key(SOURCE_VARIANT_KEY)
    {
        match serde_json::from_value(Value::Object(body.clone())) {
            Ok(frame) => return Shape::Normalized(frame),
            Err(e) => trace!("payload looks normalized but does not read back: {e}"),
        }
    }
    Shape::Unrecognized
}

/// Normalizes a `payload` message, using the enclosing message as a
/// fallback location for the frame index.
pub fn normalize_message(msg: &ControlMessage) -> AnalyticsFrame {
    normalize_inner(msg.payload_body(), Some(&msg.fields))
}

/// Normalizes a bare analytics body.
pub fn normalize(body: &Map<String, Value>) -> AnalyticsFrame {
    normalize_inner(body, None)
}

fn normalize_inner(
    body: &Map<String, Value>,
    envelope: Option<&Map<String, Value>>,
) -> AnalyticsFrame {
    match detect(body) {
        Shape::Tracks(tracks) => {
            let objects: Vec<TrackSummary> = tracks
                .iter()
                .map(|(id, info)| summarize_track(id, info))
                .collect();
            AnalyticsFrame {
                frame_index: frame_index(body, envelope, TRACK_FRAME_INDEX_KEYS),
                object_count: objects.len(),
                objects,
                lane_count: None,
                source_variant: SourceVariant::Tracks,
            }
        }
        Shape::Lanes { lanes, stats } => {
            let occupied = stats
                .and_then(|s| s.get(OCCUPIED_LANES_KEY))
                .and_then(as_index)
                .unwrap_or(0);
            AnalyticsFrame {
                frame_index: frame_index(body, envelope, LANE_FRAME_INDEX_KEYS),
                object_count: usize::try_from(occupied).unwrap_or(usize::MAX),
                objects: Vec::new(),
                lane_count: Some(lanes.len()),
                source_variant: SourceVariant::Lanes,
            }
        }
        Shape::Normalized(frame) => frame,
        Shape::Unrecognized => {
            trace!("payload matched no known analytics shape");
            let index = match frame_index(body, envelope, TRACK_FRAME_INDEX_KEYS) {
                FrameIndex::Unknown => frame_index(body, envelope, LANE_FRAME_INDEX_KEYS),
                known => known,
            };
            AnalyticsFrame::unrecognized(index)
        }
    }
}

fn summarize_track(id: &str, info: &Value) -> TrackSummary {
    let Some(info) = info.as_object() else {
        return TrackSummary {
            id: id.to_string(),
            status: DEFAULT_STATUS.into(),
            area: AreaDescriptor::default(),
        };
    };

    let status = fields::lookup_str(info, STATUS_KEYS).unwrap_or(DEFAULT_STATUS);
    let area = match fields::lookup_object(info, AREA_KEYS) {
        Some(area) => AreaDescriptor {
            name: fields::lookup_str(area, AREA_NAME_KEYS)
                .unwrap_or(DEFAULT_AREA_NAME)
                .to_string(),
            area_type: fields::lookup_str(area, AREA_TYPE_KEYS)
                .unwrap_or(DEFAULT_AREA_TYPE)
                .to_string(),
        },
        None => AreaDescriptor::default(),
    };

    TrackSummary {
        id: id.to_string(),
        status: status.to_string(),
        area,
    }
}

/// Resolves the frame index from the body, then the envelope.
fn frame_index(
    body: &Map<String, Value>,
    envelope: Option<&Map<String, Value>>,
    keys: &[&str],
) -> FrameIndex {
    fields::lookup(body, keys)
        .or_else(|| envelope.and_then(|e| fields::lookup(e, keys)))
        .and_then(as_index)
        .map_or(FrameIndex::Unknown, FrameIndex::Known)
}

/// Reads a non-negative integer, tolerating integral floats and numeric
/// strings.
fn as_index(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f < u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
