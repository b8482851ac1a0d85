use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::error::Result;
use crate::proto::cipher::CipherParams;
use crate::proto::data::Data;
use crate::proto::encoding::{Encoding, EncodingStage};
use crate::proto::message::Message;
use crate::proto::protocol::Protocol;
use crate::rest::client::ClientInner;
use crate::rest::options::ChannelOptions;
use crate::rest::transport::Method;


/// A named channel of a [crate::rest::RestClient]. Handles are shared through the client's
///  [ChannelRegistry].
pub struct RestChannel {
    name: String,
    options: RwLock<ChannelOptions>,
    client: Arc<ClientInner>,
}

impl RestChannel {
    fn new(name: &str, options: ChannelOptions, client: Arc<ClientInner>) -> RestChannel {
        RestChannel {
            name: name.to_string(),
            options: RwLock::new(options),
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> ChannelOptions {
        self.options.read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_options(&self, options: ChannelOptions) {
        *self.options.write().unwrap_or_else(PoisonError::into_inner) = options;
    }

    fn messages_path(&self) -> String {
        format!("/channels/{}/messages", urlencoding::encode(&self.name))
    }

    pub async fn publish(&self, name: impl Into<String>, data: impl Into<Data>) -> Result<()> {
        self.publish_messages(vec![Message::new(name, data)]).await
    }

    /// Encodes all messages for the client's protocol (encrypting them if the channel has cipher
    ///  params) and sends them in a single request.
    pub async fn publish_messages(&self, mut messages: Vec<Message>) -> Result<()> {
        let cipher = self.options().cipher;
        for message in &mut messages {
            prepare_for_publish(message, self.client.protocol(), cipher.as_ref())?;
        }

        let request = self.client.request_with_body(Method::Post, &self.messages_path(), &messages)?;
        trace!(channel = %self.name, num_messages = messages.len(), "publishing");
        self.client.execute(&request).await?;
        Ok(())
    }

    /// The channel's message history, with each message's data decoded. A message that can not
    ///  be decoded fails the whole call.
    pub async fn history(&self) -> Result<Vec<Message>> {
        let request = self.client.request(Method::Get, &self.messages_path());
        let response = self.client.execute(&request).await?;

        let mut messages: Vec<Message> = self.client.decode_body(&response)?;
        let cipher = self.options().cipher;
        for message in &mut messages {
            message.decode_data(cipher.as_ref())?;
        }
        Ok(messages)
    }
}

/// Encodes a message's data for sending. Without a cipher, the encoding only describes how the
///  protocol represents the data. With a cipher, structured data is sent as JSON text, and JSON
///  needs a final base64 stage for the encrypted bytes.
fn prepare_for_publish(message: &mut Message, protocol: Protocol, cipher: Option<&CipherParams>) -> Result<()> {
    let Some(data) = &message.data else {
        return Ok(());
    };

    let Some(cipher) = cipher else {
        let encoding = protocol.value_encoding(data);
        return message.encode_data(&encoding, None);
    };

    let mut encoding = Encoding::new();
    if let Data::Structured(value) = data {
        let json = serde_json::to_string(value)?;
        message.data = Some(Data::Text(json));
        encoding.push(EncodingStage::Json);
    }
    if let Some(Data::Text(_)) = &message.data {
        encoding.push(EncodingStage::Utf8);
    }
    encoding.push(EncodingStage::Cipher(cipher.algorithm.clone()));
    if protocol == Protocol::Json {
        encoding.push(EncodingStage::Base64);
    }
    message.encode_data(&encoding, Some(cipher))
}


/// Maps channel names to shared channel handles. The lock is only held while the map itself is
///  accessed, so callbacks may use the registry freely.
pub struct ChannelRegistry {
    client: Arc<ClientInner>,
    channels: Mutex<FxHashMap<String, Arc<RestChannel>>>,
}

impl ChannelRegistry {
    pub(crate) fn new(client: Arc<ClientInner>) -> ChannelRegistry {
        ChannelRegistry {
            client,
            channels: Default::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FxHashMap<String, Arc<RestChannel>>> {
        self.channels.lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// the existing handle for `name`, or a new one with default options
    pub fn get(&self, name: &str) -> Arc<RestChannel> {
        let mut channels = self.lock();
        if let Some(channel) = channels.get(name) {
            return channel.clone();
        }

        debug!(channel = name, "creating channel");
        let channel = Arc::new(RestChannel::new(name, ChannelOptions::default(), self.client.clone()));
        channels.insert(name.to_string(), channel.clone());
        channel
    }

    /// like [ChannelRegistry::get], replacing an existing handle's options
    pub fn get_with_options(&self, name: &str, options: ChannelOptions) -> Arc<RestChannel> {
        let mut channels = self.lock();
        if let Some(channel) = channels.get(name) {
            channel.set_options(options);
            return channel.clone();
        }

        debug!(channel = name, "creating channel");
        let channel = Arc::new(RestChannel::new(name, options, self.client.clone()));
        channels.insert(name.to_string(), channel.clone());
        channel
    }

    pub fn exists(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Removes the channel's entry. Releasing a handle that was already released (or replaced
    ///  by a newer handle for the same name) does nothing.
    pub fn release(&self, channel: &Arc<RestChannel>) {
        let mut channels = self.lock();
        if channels.get(channel.name()).is_some_and(|c| Arc::ptr_eq(c, channel)) {
            debug!(channel = channel.name(), "releasing channel");
            channels.remove(channel.name());
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Calls `visit` for each channel that is registered when the call starts, stopping early
    ///  when `visit` returns `false`.
    pub fn range(&self, mut visit: impl FnMut(&str, &Arc<RestChannel>) -> bool) {
        let snapshot = self.lock()
            .iter()
            .map(|(name, channel)| (name.clone(), channel.clone()))
            .collect::<Vec<_>>();

        for (name, channel) in &snapshot {
            if !visit(name, channel) {
                break;
            }
        }
    }
}
