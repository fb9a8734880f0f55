//! # Outbound message model.
//!
//! A [`Message`] is an opaque payload plus the routing metadata a broker needs
//! to deliver it. The publisher never inspects the payload.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;

/// Persistence requested from the broker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Kept in memory only.
    Transient,
    /// Written to disk by the broker before confirming.
    #[default]
    Persistent,
}

/// Basic properties carried with a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageProperties {
    /// MIME type of the payload.
    pub content_type: Option<Arc<str>>,
    /// Persistence hint.
    pub delivery_mode: DeliveryMode,
    /// Application supplied identifier.
    pub message_id: Option<Arc<str>>,
    /// Free-form string headers.
    pub headers: BTreeMap<String, String>,
}

/// A message ready to be published.
///
/// Cloning is cheap: the payload is reference counted.
///
/// ## Example
/// ```rust
/// use chanpool::{DeliveryMode, Message};
///
/// let msg = Message::new("orders", "order.created", "{\"id\":1}")
///     .with_content_type("application/json")
///     .with_header("tenant", "acme")
///     .with_delivery_mode(DeliveryMode::Transient);
///
/// assert_eq!(msg.exchange(), "orders");
/// assert_eq!(msg.routing_key(), "order.created");
/// assert_eq!(msg.properties().headers["tenant"], "acme");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    exchange: Arc<str>,
    routing_key: Arc<str>,
    properties: MessageProperties,
    payload: Bytes,
}

impl Message {
    /// Creates a message with default properties.
    pub fn new(
        exchange: impl Into<Arc<str>>,
        routing_key: impl Into<Arc<str>>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            properties: MessageProperties::default(),
            payload: payload.into(),
        }
    }

    /// Sets the content type.
    #[inline]
    pub fn with_content_type(mut self, content_type: impl Into<Arc<str>>) -> Self {
        self.properties.content_type = Some(content_type.into());
        self
    }

    /// Sets the message id.
    #[inline]
    pub fn with_message_id(mut self, id: impl Into<Arc<str>>) -> Self {
        self.properties.message_id = Some(id.into());
        self
    }

    /// Adds a header.
    #[inline]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.headers.insert(key.into(), value.into());
        self
    }

    /// Sets the delivery mode.
    #[inline]
    pub fn with_delivery_mode(mut self, mode: DeliveryMode) -> Self {
        self.properties.delivery_mode = mode;
        self
    }

    /// Replaces all properties.
    #[inline]
    pub fn with_properties(mut self, properties: MessageProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Exchange the message is published to.
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Routing key used by the exchange.
    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    /// Basic properties sent alongside the payload.
    pub fn properties(&self) -> &MessageProperties {
        &self.properties
    }

    /// Raw payload; shared between clones.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_getters_reflect_builder_calls() {
        let msg = Message::new("billing", "invoice.paid", "body")
            .with_message_id("m-7")
            .with_content_type("text/plain");

        assert_eq!(msg.exchange(), "billing");
        assert_eq!(msg.routing_key(), "invoice.paid");
        assert_eq!(msg.payload().as_ref(), b"body");
        assert_eq!(msg.properties().message_id.as_deref(), Some("m-7"));
        assert_eq!(msg.properties().content_type.as_deref(), Some("text/plain"));
        assert_eq!(msg.properties().delivery_mode, DeliveryMode::Persistent);
    }

    #[test]
    fn test_clones_share_the_payload() {
        let msg = Message::new("ex", "rk", vec![0u8; 64]);
        let copy = msg.clone();

        assert_eq!(copy, msg);
        assert_eq!(copy.payload().as_ptr(), msg.payload().as_ptr());
    }
}
