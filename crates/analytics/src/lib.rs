//! Analytics payload normalization.
//!
//! The detection service reports results in more than one schema. This
//! crate maps each of them into a single [`AnalyticsFrame`].

pub mod frame;
pub mod normalize;

pub use frame::{AnalyticsFrame, AreaDescriptor, FrameIndex, SourceVariant, TrackSummary};
pub use normalize::{normalize, normalize_message};
