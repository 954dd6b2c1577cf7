//! Ordered, role-tagged message history owned by one session.

use crate::error::TandemError;
use crate::types::{Message, Role, ToolCallRequest};

/// Insertion-ordered message list.
///
/// Indices may be negative: `-1` addresses the last message, `-2` the one
/// before it. Out-of-range lookups return [`TandemError::MessageNotFound`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationStore {
    messages: Vec<Message>,
}

impl ConversationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with a copy of existing messages.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Append a plain message with the given role.
    pub fn append(&mut self, role: Role, text: impl Into<String>) {
        self.messages.push(Message::new(role, text));
    }

    /// Append an assistant message carrying tool-call markers.
    pub fn append_assistant(&mut self, text: impl Into<String>, tool_calls: Vec<ToolCallRequest>) {
        self.messages
            .push(Message::assistant_with_tool_calls(text, tool_calls));
    }

    /// Append a tool result answering a prior assistant tool call.
    pub fn append_tool_result(
        &mut self,
        tool_call_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<(), TandemError> {
        let tool_call_id = tool_call_id.into();
        if !self.has_tool_call(&tool_call_id) {
            return Err(TandemError::InvalidState(format!(
                "no prior assistant tool call with id '{tool_call_id}'"
            )));
        }
        self.messages.push(Message::tool_result(tool_call_id, text));
        Ok(())
    }

    /// Append an arbitrary message, enforcing the tool-result invariant.
    pub fn push(&mut self, message: Message) -> Result<(), TandemError> {
        if message.role == Role::Tool {
            let id = message.tool_call_id.as_deref().ok_or_else(|| {
                TandemError::InvalidState("tool message without tool_call_id".to_string())
            })?;
            if !self.has_tool_call(id) {
                return Err(TandemError::InvalidState(format!(
                    "no prior assistant tool call with id '{id}'"
                )));
            }
        }
        self.messages.push(message);
        Ok(())
    }

    /// Remove every message.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Number of stored messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// All messages in insertion order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get a message by index; negative indices count from the end.
    pub fn get(&self, index: isize) -> Result<&Message, TandemError> {
        self.resolve(index)
            .map(|i| &self.messages[i])
            .ok_or(TandemError::MessageNotFound {
                index,
                len: self.messages.len(),
            })
    }

    /// Text of the message at `index`.
    pub fn text(&self, index: isize) -> Result<&str, TandemError> {
        self.get(index).map(|m| m.text.as_str())
    }

    /// Number of messages with `role`.
    pub fn count_by_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }

    /// Index of the most recent message with `role`.
    pub fn last_index_matching(&self, role: Role) -> Option<usize> {
        self.messages.iter().rposition(|m| m.role == role)
    }

    /// Whether an assistant message emitted a tool call with `id`.
    pub fn has_tool_call(&self, id: &str) -> bool {
        self.messages
            .iter()
            .filter(|m| m.has_tool_calls())
            .flat_map(|m| m.tool_calls.iter())
            .any(|call| call.id == id)
    }

    fn resolve(&self, index: isize) -> Option<usize> {
        let len = self.messages.len();
        if index >= 0 {
            let i = index as usize;
            (i < len).then_some(i)
        } else {
            len.checked_sub(index.unsigned_abs())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store_with(texts: &[&str]) -> ConversationStore {
        let mut store = ConversationStore::new();
        for text in texts {
            store.append(Role::User, *text);
        }
        store
    }

    #[test]
    fn negative_index_addresses_from_end() {
        let store = store_with(&["a", "b", "c"]);
        assert_eq!(store.text(-1).unwrap(), "c");
        assert_eq!(store.text(-1).unwrap(), store.text(2).unwrap());
        assert_eq!(store.text(-3).unwrap(), "a");
    }

    #[test]
    fn out_of_range_index_is_not_found() {
        let store = store_with(&["a", "b"]);
        assert_eq!(
            store.get(2).unwrap_err(),
            TandemError::MessageNotFound { index: 2, len: 2 }
        );
        assert_eq!(
            store.get(-3).unwrap_err(),
            TandemError::MessageNotFound { index: -3, len: 2 }
        );
        assert!(ConversationStore::new().get(-1).is_err());
    }

    #[test]
    fn count_tracks_appends_since_clear() {
        let mut store = store_with(&["a", "b", "c"]);
        assert_eq!(store.len(), 3);
        store.clear();
        assert!(store.is_empty());
        store.append(Role::System, "rules");
        store.append(Role::User, "hi");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn count_by_role_and_last_index() {
        let mut store = ConversationStore::new();
        store.append(Role::System, "rules");
        store.append(Role::User, "one");
        store.append(Role::Assistant, "reply");
        store.append(Role::User, "two");

        assert_eq!(store.count_by_role(Role::User), 2);
        assert_eq!(store.count_by_role(Role::Tool), 0);
        assert_eq!(store.last_index_matching(Role::User), Some(3));
        assert_eq!(store.last_index_matching(Role::Assistant), Some(2));
        assert_eq!(store.last_index_matching(Role::Developer), None);
    }

    #[test]
    fn tool_result_requires_prior_tool_call() {
        let mut store = ConversationStore::new();
        let err = store.append_tool_result("call_1", "42").unwrap_err();
        assert!(matches!(err, TandemError::InvalidState(_)));

        store.append_assistant("", vec![ToolCallRequest::new("call_1", "lookup", "{}")]);
        store.append_tool_result("call_1", "42").unwrap();

        let last = store.get(-1).unwrap();
        assert_eq!(last.role, Role::Tool);
        assert_eq!(last.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn push_rejects_orphan_tool_message() {
        let mut store = ConversationStore::new();
        assert!(store.push(Message::tool_result("missing", "x")).is_err());
        assert!(store.push(Message::user("fine")).is_ok());
        assert_eq!(store.len(), 1);
    }
}
