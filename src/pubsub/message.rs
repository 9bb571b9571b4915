use std::sync::Arc;

/// Опубликованное сообщение: тема и содержимое.
///
/// Неизменяемо после публикации. Тема и содержимое лежат за `Arc<str>`,
/// поэтому рассылка N подписчикам копирует только указатели.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: Arc<str>,
    pub content: Arc<str>,
}

impl Message {
    pub fn new(
        topic: impl Into<Arc<str>>,
        content: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            topic: topic.into(),
            content: content.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}
