//! Small shared helpers with no pipeline state.

pub mod html;
pub mod mime;
pub mod path;
pub mod plural;
