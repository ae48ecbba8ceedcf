use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tokio::sync::watch;

use crate::constants::storage::{ACTIVE_CONVERSATION_KEY, CONVERSATIONS_KEY};
use crate::store::{ContextWindow, Conversation, ConversationSummary, KeyValueStorage, Message};

const ID_PREFIX: &str = "conv_";

/// All conversations plus the active pointer, written through to storage on
/// every change.
///
/// After [`ConversationStore::open`] the store is never empty and the active
/// id always names an existing conversation.
pub struct ConversationStore {
    storage: Box<dyn KeyValueStorage>,
    // Ids sort in generation order, so iteration order is creation order.
    conversations: BTreeMap<String, Conversation>,
    active_id: String,
    last_id_millis: i64,
    last_tick: DateTime<Utc>,
    list_tx: watch::Sender<Vec<ConversationSummary>>,
}

fn id_millis(id: &str) -> Option<i64> {
    id.strip_prefix(ID_PREFIX)?.parse().ok()
}

fn load_conversations(storage: &dyn KeyValueStorage) -> BTreeMap<String, Conversation> {
    let blob = match storage.get(CONVERSATIONS_KEY) {
        Ok(Some(blob)) => blob,
        Ok(None) => return BTreeMap::new(),
        Err(e) => {
            tracing::error!("Error loading conversations: {e}");
            return BTreeMap::new();
        }
    };

    match serde_json::from_str::<BTreeMap<String, Conversation>>(&blob) {
        Ok(mut conversations) => {
            for (id, conversation) in conversations.iter_mut() {
                if conversation.id() != id {
                    conversation.set_id(id.clone());
                }
            }
            conversations
        }
        Err(e) => {
            tracing::error!("Error parsing saved conversations, starting fresh: {e}");
            BTreeMap::new()
        }
    }
}

impl ConversationStore {
    /// Load persisted state. Missing or unreadable state is logged and
    /// replaced by a single fresh conversation.
    pub fn open(storage: Box<dyn KeyValueStorage>) -> Self {
        let conversations = load_conversations(storage.as_ref());
        let stored_active = storage.get(ACTIVE_CONVERSATION_KEY).unwrap_or_else(|e| {
            tracing::error!("Error loading active conversation id: {e}");
            None
        });
        let last_id_millis = conversations
            .keys()
            .filter_map(|id| id_millis(id))
            .max()
            .unwrap_or(0);

        let last_tick = conversations
            .values()
            .map(|c| c.updated_at())
            .max()
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let (list_tx, _) = watch::channel(Vec::new());
        let mut store = Self {
            storage,
            conversations,
            active_id: String::new(),
            last_id_millis,
            last_tick,
            list_tx,
        };

        match stored_active.filter(|id| store.conversations.contains_key(id)) {
            Some(id) => {
                store.active_id = id;
                store.publish();
            }
            None => {
                store.create();
            }
        }
        tracing::debug!(
            "Opened conversation store with {} conversations",
            store.conversations.len()
        );
        store
    }

    fn next_id(&mut self) -> String {
        let millis = Utc::now().timestamp_millis().max(self.last_id_millis + 1);
        self.last_id_millis = millis;
        format!("{ID_PREFIX}{millis}")
    }

    /// Current time, nudged forward so every change gets a distinct,
    /// increasing timestamp.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let at = if now > self.last_tick {
            now
        } else {
            self.last_tick + Duration::microseconds(1)
        };
        self.last_tick = at;
        at
    }

    /// Start a new empty conversation and make it active. Returns its id.
    pub fn create(&mut self) -> String {
        self.flush();
        let id = self.next_id();
        let at = self.tick();
        self.conversations
            .insert(id.clone(), Conversation::created_at_time(id.clone(), at));
        self.active_id = id.clone();
        self.persist();
        self.publish();
        id
    }

    /// Make `id` active. Unknown ids are ignored and return false.
    pub fn switch_to(&mut self, id: &str) -> bool {
        if !self.conversations.contains_key(id) {
            return false;
        }
        self.flush();
        self.active_id = id.to_string();
        self.persist();
        self.publish();
        true
    }

    /// Append to `id`, whether or not it is active.
    pub fn append(&mut self, id: &str, message: Message) -> bool {
        if !self.conversations.contains_key(id) {
            tracing::error!("Target conversation not found: {id}");
            return false;
        }
        let at = self.tick();
        if let Some(conversation) = self.conversations.get_mut(id) {
            conversation.push(message, at);
        }
        self.persist();
        self.publish();
        true
    }

    /// Remove `id`. When it was active, the most recently updated remaining
    /// conversation becomes active, or a fresh one is created.
    pub fn delete(&mut self, id: &str) -> bool {
        if self.conversations.remove(id).is_none() {
            return false;
        }
        if self.active_id == id {
            let next = self.list().first().map(|c| c.id().to_string());
            match next {
                Some(next) => self.active_id = next,
                None => {
                    self.active_id.clear();
                    self.create();
                    return true;
                }
            }
        }
        self.persist();
        self.publish();
        true
    }

    /// Conversations by `updated_at` descending; ties keep creation order.
    pub fn list(&self) -> Vec<&Conversation> {
        let mut list: Vec<&Conversation> = self.conversations.values().collect();
        list.sort_by(|a, b| b.updated_at().cmp(&a.updated_at()));
        list
    }

    pub fn summaries(&self) -> Vec<ConversationSummary> {
        self.list()
            .into_iter()
            .map(|c| c.summary(c.id() == self.active_id))
            .collect()
    }

    /// Receiver of the ordered summary list, refreshed after every change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<ConversationSummary>> {
        self.list_tx.subscribe()
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.conversations.contains_key(id)
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.conversations.get(&self.active_id)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active_id == id
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// The last `max_messages` messages of `id`; empty for unknown ids.
    pub fn context_window(&self, id: &str, max_messages: usize) -> ContextWindow {
        match self.conversations.get(id) {
            Some(conversation) => ContextWindow::from_messages(conversation.messages(), max_messages),
            None => ContextWindow::new(max_messages),
        }
    }

    /// Write the current state before the active pointer moves.
    fn flush(&self) {
        if !self.active_id.is_empty() {
            self.persist();
        }
    }

    fn persist(&self) {
        match serde_json::to_string(&self.conversations) {
            Ok(blob) => {
                if let Err(e) = self.storage.set(CONVERSATIONS_KEY, &blob) {
                    tracing::error!("Error saving conversations: {e}");
                }
            }
            Err(e) => tracing::error!("Error serializing conversations: {e}"),
        }
        if !self.active_id.is_empty() {
            if let Err(e) = self.storage.set(ACTIVE_CONVERSATION_KEY, &self.active_id) {
                tracing::error!("Error saving active conversation id: {e}");
            }
        }
    }

    fn publish(&self) {
        self.list_tx.send_replace(self.summaries());
    }
}
