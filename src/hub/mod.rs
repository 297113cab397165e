// Real-time fan-out hub
//
// Subscribers register per topic (room), publishers push opaque payloads to
// every live subscriber of that topic, and each subscription cleans itself up
// when its token fires or its connection goes away.

// Public API - what other modules can use
pub use connection::{Connection, ConnectionId, DeliveryError, Payload};
pub use registry::{Hub, Subscriber};
pub use subscription::{Admission, HubError, SubscriptionState, TerminationCause, TopicStore};
pub use tokio_util::sync::CancellationToken;

/// Topics are rooms, identified by their UUID
pub type TopicId = uuid::Uuid;

// Internal modules
mod connection;
mod publisher;
mod registry;
mod subscription;
