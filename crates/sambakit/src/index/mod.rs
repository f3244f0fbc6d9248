//! Managed-block shares index.
//!
//! The shares index is a Samba include file that lists one section per
//! share. Sections written by samba-admin are wrapped in marker comments:
//!
//! ```text
//! ; samba-admin-ui:begin photos
//! [photos]
//!    include = /etc/samba/shares.d/ui/photos.conf
//!    available = no
//!    browseable = no
//! ; samba-admin-ui:end photos
//! ```
//!
//! Only marked blocks are ever rewritten or removed; hand-written sections
//! in the same file are left alone.

pub mod parser;
pub mod writer;

pub use parser::{parse_file, parse_str};
pub use writer::{ensure_referenced, remove, render_block, set_disabled};

/// Prefix of the comment line opening a managed block.
pub const BEGIN_MARKER: &str = "; samba-admin-ui:begin ";

/// Prefix of the comment line closing a managed block.
pub const END_MARKER: &str = "; samba-admin-ui:end ";
