//! Publishing core: channel actors, publishers and the pool factory.
//!
//! Public API from this module: the [`Publisher`] trait with its two
//! implementations, the [`PublisherFactory`] and the request handle types.
//!
//! Internal modules:
//! - [`actor`]: owns one channel's pending confirms, backlog, retries and timers;
//! - [`single`]: handle in front of one actor, lifecycle and id assignment;
//! - [`round_robin`]: rotation over N publishers;
//! - [`factory`] / [`builder`]: pool construction;
//! - [`request`]: request ids, outcomes and the `PendingPublish` future.

mod actor;
mod builder;
mod factory;
mod publisher;
mod request;
mod round_robin;
mod single;

pub(crate) use actor::Command;
pub use builder::PublisherFactoryBuilder;
pub use factory::PublisherFactory;
pub use publisher::Publisher;
pub use request::{Confirmation, PendingPublish, PublishResult, RequestId};
pub use round_robin::RoundRobinPublisher;
pub use single::SingleChannelPublisher;
