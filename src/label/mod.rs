/*!
 * Label Module
 * Profiles, labels and the resolver seam
 */

pub mod profile;
pub mod registry;
pub mod traits;
pub mod types;

pub use profile::{path_flags, Profile, ProfileMode};
pub use registry::LabelRegistry;
pub use traits::LabelResolver;
pub use types::{Cred, Label, Subject, LABEL_SEPARATOR};
