//! Pipeline step implementations.

mod convert;
mod deface;
mod read_metadata;
mod reset_output;
mod snapshot;
mod validate;

pub use convert::ConvertStep;
pub use deface::DefaceStep;
pub use read_metadata::ReadMetadataStep;
pub use reset_output::ResetOutputStep;
pub use snapshot::SnapshotStep;
pub use validate::ValidateStep;
