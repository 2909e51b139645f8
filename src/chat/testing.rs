//! In-process fakes for the chat transport seams.

use super::api::ChatApi;
use super::directory::ChannelDirectory;
use super::error::{ChatError, Result as ChatResult};
use super::types::ChannelInfo;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

pub(crate) fn channel(id: &str) -> ChannelInfo {
    ChannelInfo {
        channel_type: "messaging".to_string(),
        channel_id: id.to_string(),
        owner_identity: "0xowner".to_string(),
    }
}

/// Directory that answers with a scripted sequence of channel ids. The last id
/// repeats once the script runs out; an empty script always fails.
pub(crate) struct ScriptedDirectory {
    ids: Mutex<VecDeque<String>>,
    lookups: Mutex<u32>,
}

impl ScriptedDirectory {
    pub(crate) fn new(ids: &[&str]) -> Self {
        Self {
            ids: Mutex::new(ids.iter().map(|s| s.to_string()).collect()),
            lookups: Mutex::new(0),
        }
    }

    pub(crate) fn lookups(&self) -> u32 {
        *self.lookups.lock().unwrap()
    }
}

#[async_trait]
impl ChannelDirectory for ScriptedDirectory {
    async fn lookup(&self, _handle: &str) -> ChatResult<ChannelInfo> {
        *self.lookups.lock().unwrap() += 1;
        let mut ids = self.ids.lock().unwrap();
        let id = if ids.len() > 1 {
            ids.pop_front()
        } else {
            ids.front().cloned()
        };
        id.map(|id| channel(&id))
            .ok_or_else(|| ChatError::Directory("no such streamer".to_string()))
    }
}

/// Records every accepted send as `(cid, text)` and fails the calls it is told to.
#[derive(Default)]
pub(crate) struct FakeChatApi {
    sent: Mutex<Vec<(String, String)>>,
    send_failures: Mutex<VecDeque<ChatError>>,
    watch_failures: Mutex<VecDeque<ChatError>>,
    watches: Mutex<Vec<(String, String)>>,
}

impl FakeChatApi {
    pub(crate) fn fail_next_send(&self, error: ChatError) {
        self.send_failures.lock().unwrap().push_back(error);
    }

    pub(crate) fn fail_next_watch(&self, error: ChatError) {
        self.watch_failures.lock().unwrap().push_back(error);
    }

    pub(crate) fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn sent_texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text)| text).collect()
    }

    pub(crate) fn watches(&self) -> Vec<(String, String)> {
        self.watches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatApi for FakeChatApi {
    async fn send_message(&self, channel: &ChannelInfo, text: &str) -> ChatResult<Option<String>> {
        if let Some(error) = self.send_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((channel.cid(), text.to_string()));
        Ok(Some(format!("srv-{}", sent.len())))
    }

    async fn watch_channel(&self, channel: &ChannelInfo, connection_id: &str) -> ChatResult<()> {
        if let Some(error) = self.watch_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.watches
            .lock()
            .unwrap()
            .push((channel.cid(), connection_id.to_string()));
        Ok(())
    }
}
