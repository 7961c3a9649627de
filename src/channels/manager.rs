//! Channel manager: owns every channel and routes replies by name.

use std::collections::HashMap;

use futures::stream;
use tracing::{info, warn};

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;

#[derive(Default)]
pub struct ChannelManager {
    channels: HashMap<String, Box<dyn Channel>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel. A channel with the same name is replaced.
    pub fn add(&mut self, channel: Box<dyn Channel>) {
        let name = channel.name().to_string();
        if self.channels.insert(name.clone(), channel).is_some() {
            warn!(channel = %name, "Replaced existing channel");
        }
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.channels.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Start every channel and merge their streams.
    pub async fn start_all(&self) -> Result<MessageStream, ChannelError> {
        let mut streams = Vec::with_capacity(self.channels.len());
        for (name, channel) in &self.channels {
            streams.push(channel.start().await?);
            info!(channel = %name, "Channel started");
        }
        Ok(Box::pin(stream::select_all(streams)))
    }

    fn get(&self, name: &str) -> Result<&dyn Channel, ChannelError> {
        self.channels
            .get(name)
            .map(|c| c.as_ref())
            .ok_or_else(|| ChannelError::UnknownChannel {
                name: name.to_string(),
            })
    }

    /// Reply on the channel the message arrived on.
    pub async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        self.get(&msg.channel)?.respond(msg, response).await
    }

    /// Health of every channel, keyed by name.
    pub async fn health_check_all(&self) -> HashMap<String, Result<(), ChannelError>> {
        let mut results = HashMap::new();
        for (name, channel) in &self.channels {
            results.insert(name.clone(), channel.health_check().await);
        }
        results
    }

    /// Shut every channel down, reporting the first failure after trying all.
    pub async fn shutdown_all(&self) -> Result<(), ChannelError> {
        let mut first_error = None;
        for (name, channel) in &self.channels {
            if let Err(e) = channel.shutdown().await {
                warn!(channel = %name, error = %e, "Channel shutdown failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use futures::StreamExt;

    use super::*;

    struct FakeChannel {
        name: &'static str,
        inbound: Vec<&'static str>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Channel for FakeChannel {
        fn name(&self) -> &str {
            self.name
        }

        async fn start(&self) -> Result<MessageStream, ChannelError> {
            let name = self.name;
            let messages: Vec<_> = self
                .inbound
                .iter()
                .map(|text| IncomingMessage::new(name, "u", text))
                .collect();
            Ok(Box::pin(stream::iter(messages)))
        }

        async fn respond(
            &self,
            _msg: &IncomingMessage,
            response: OutgoingResponse,
        ) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(response.content);
            Ok(())
        }

        async fn health_check(&self) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    fn manager() -> (ChannelManager, Arc<Mutex<Vec<String>>>, Arc<Mutex<Vec<String>>>) {
        let a_sent = Arc::new(Mutex::new(Vec::new()));
        let b_sent = Arc::new(Mutex::new(Vec::new()));
        let mut manager = ChannelManager::new();
        manager.add(Box::new(FakeChannel {
            name: "a",
            inbound: vec!["one", "two"],
            sent: a_sent.clone(),
        }));
        manager.add(Box::new(FakeChannel {
            name: "b",
            inbound: vec!["three"],
            sent: b_sent.clone(),
        }));
        (manager, a_sent, b_sent)
    }

    #[tokio::test]
    async fn start_all_merges_streams() {
        let (manager, _, _) = manager();
        let stream = manager.start_all().await.unwrap();
        let mut contents: Vec<String> = stream.map(|m| m.content).collect().await;
        contents.sort();
        assert_eq!(contents, vec!["one", "three", "two"]);
    }

    #[tokio::test]
    async fn respond_routes_by_channel_name() {
        let (manager, a_sent, b_sent) = manager();
        let msg = IncomingMessage::new("b", "u", "hi");
        manager
            .respond(&msg, OutgoingResponse::text("hello b"))
            .await
            .unwrap();

        assert!(a_sent.lock().unwrap().is_empty());
        assert_eq!(*b_sent.lock().unwrap(), vec!["hello b"]);
    }

    #[tokio::test]
    async fn unknown_channel_is_an_error() {
        let (manager, _, _) = manager();
        let msg = IncomingMessage::new("nope", "u", "hi");
        let err = manager
            .respond(&msg, OutgoingResponse::text("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::UnknownChannel { .. }));
        assert_eq!(manager.names(), vec!["a", "b"]);
    }
}
