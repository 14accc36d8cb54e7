#![cfg_attr(docsrs, feature(doc_cfg))]
//! Typed station configuration model over the SCM text layer.
//!
//! The text layer hands over tags one at a time; this crate supplies the
//! meaning: per-section descriptor tables, typed decoding into record
//! slots, the channel source grammar, and the dispatch tables the
//! acquisition pipeline routes through. Malformed content never aborts a
//! parse; it is counted per section and the affected field or channel is
//! skipped.

pub mod decode;
pub mod descriptor;
pub mod dispatch;
pub mod grammar;
pub mod reader;
pub mod records;
pub mod session;

pub use decode::{decode_value, FieldError, SlotMut};
pub use descriptor::{
    ArrayFrame, ArrayStack, DescKind, FieldDescriptor, IndexKind, TagMatch, ValueType,
};
pub use dispatch::{ChanHandle, DispatchTables};
pub use grammar::{resolve_source, ResolvedSource, SourceEnv, SourceError};
pub use reader::{read_section, FieldTarget, SectionReport};
pub use records::{
    Channel, ChannelSet, Detector, DetectorParams, DetectorSet, DigitizerRecord, FilterChain,
    FilterSection, IirFilter, NetcfgRecord, Sensor, SensorsRecord, StationRecord,
};
pub use session::{acquire, try_acquire, Session};
