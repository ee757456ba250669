//! in-place: atomic, crash-safe in-place file editing
//!
//! Read a file's current content and write its replacement through a single
//! [`InPlace`] session. Writes go to a temporary file created next to the
//! original; on [`commit`](InPlace::commit) the temporary file is renamed
//! over the original, so the path always holds either the old content or the
//! new content in full.
//!
//! # Safety
//!
//! - Temp file lives in the target's directory, so the final rename stays
//!   on one filesystem
//! - Writes are flushed and fsynced before the rename
//! - Permissions, timestamps and (best-effort) ownership carry over
//! - Optional backup of the original via `backup` or `backup_ext`
//! - Any failure during open, or a session dropped without commit, removes
//!   the temp file and leaves the original untouched
//!
//! # Example
//!
//! ```no_run
//! use in_place::{EditOptions, InPlace, InPlaceError};
//!
//! let options = EditOptions::new().backup_ext(".bak");
//! InPlace::edit("notes.txt", &options, |session| {
//!     for line in session.read_lines()? {
//!         session.write(line.to_uppercase())?;
//!     }
//!     Ok::<_, InPlaceError>(())
//! })?;
//! # Ok::<_, InPlaceError>(())
//! ```

pub mod error;
mod handle;
pub mod metadata;
pub mod options;
pub mod session;
pub mod unlink;

// Re-exports
pub use error::{InPlaceError, Result};
pub use metadata::copy_metadata;
pub use options::{ConfigError, EditOptions, HandleOptions, Mode, Newline};
pub use session::{InPlace, Lines, TEMP_PREFIX};
pub use unlink::remove_if_exists;
