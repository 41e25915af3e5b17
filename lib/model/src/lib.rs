//! The in-memory profile model shared by the capture, report and web crates.
//!
//! A [Profile] is a decoded sample set: every [Sample] points to a leaf-first list of
//! [Location]s, every location to one or more (inlined) [Line]s, and every line to a
//! [Function]. Profiles are assembled with a [ProfileBuilder] and are immutable afterwards.

mod error;
mod profile;
mod units;

pub use error::ModelError;
pub use profile::{
    Function, FunctionId, Line, Location, LocationId, Mapping, Profile, ProfileBuilder, Sample,
    ValueType,
};
pub use units::{format_value, percentage};
