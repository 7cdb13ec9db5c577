//! Random File Accessor: positional read/write against local files, shared
//! across concurrent parts via a per-path handle registry.

mod handle;
mod registry;

pub use handle::FileHandle;
pub use registry::FileRegistry;
