/*!
 * Mediation
 * Entry points that assemble request descriptors and decide access
 */

pub mod inet;
pub mod mediator;
pub mod mqueue;
pub mod net;
pub mod signal;
pub mod traits;
pub mod unix;

pub use mediator::Mediator;
pub use mqueue::{PosixQueue, QueueObject};
pub use signal::map_signal_num;
pub use traits::{PathCond, PathMediator, PathRequest, UnmediatedPaths};
