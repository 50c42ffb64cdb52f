/*!
 * Core Module
 * Identities, shared scalar types, limits and the error taxonomy
 */

pub mod errors;
pub mod id;
pub mod limits;
pub mod types;

pub use errors::{MediationError, MediationResult};
pub use id::{AtomicGenerator, ObjectId, ProfileId};
pub use types::{be16, Family, PermMask, StateId, SubjectId, Uid};
