pub mod error;
pub mod invocation;
pub mod types;

pub use error::VizError;
pub use invocation::{
    build_invocation, escape_source, invocation_for, is_prebuilt_invocation,
    PREBUILT_INVOCATION_PREFIX,
};
pub use types::*;
