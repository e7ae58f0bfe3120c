pub use crate::context::CallCtx;
pub use crate::error::{Error, PlResult};
pub use crate::permission::Permission;
pub use crate::types::PeerId;

pub use tracing::{debug, debug_span, error, error_span, info, info_span, warn, warn_span};

// vim: ts=4
