use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::db::{self, queries};
use crate::models::Turn;

/// Ordered, append-only turn storage per session.
pub trait ConversationMemory: Send + Sync {
    /// The last `n` turns of the session, oldest first.
    fn recent_turns(&self, session_id: &str, n: usize) -> anyhow::Result<Vec<Turn>>;

    fn append_turn(&self, session_id: &str, turn: &Turn) -> anyhow::Result<()>;

    fn history(&self, session_id: &str) -> anyhow::Result<Vec<Turn>>;
}

/// Conversation memory backed by the `turns` table.
#[derive(Clone)]
pub struct SqliteMemory {
    db: Arc<Mutex<Connection>>,
}

impl SqliteMemory {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

impl ConversationMemory for SqliteMemory {
    fn recent_turns(&self, session_id: &str, n: usize) -> anyhow::Result<Vec<Turn>> {
        let conn = db::lock(&self.db)?;
        queries::recent_turns(&conn, session_id, n)
    }

    fn append_turn(&self, session_id: &str, turn: &Turn) -> anyhow::Result<()> {
        let conn = db::lock(&self.db)?;
        queries::append_turn(&conn, session_id, turn)
    }

    fn history(&self, session_id: &str) -> anyhow::Result<Vec<Turn>> {
        let conn = db::lock(&self.db)?;
        queries::list_turns(&conn, session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, Session};

    fn memory() -> SqliteMemory {
        let conn = db::init_db(":memory:").unwrap();
        {
            queries::upsert_session(&conn, &Session::new("s1")).unwrap();
            queries::upsert_session(&conn, &Session::new("s2")).unwrap();
        }
        SqliteMemory::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_turns_kept_in_append_order() {
        let memory = memory();
        memory.append_turn("s1", &Turn::assistant("Hello!")).unwrap();
        memory.append_turn("s1", &Turn::user("hi")).unwrap();
        memory.append_turn("s1", &Turn::assistant("How can I help?")).unwrap();

        let history = memory.history("s1").unwrap();
        let roles: Vec<Role> = history.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(history[1].text, "hi");
    }

    #[test]
    fn test_recent_turns_returns_tail_oldest_first() {
        let memory = memory();
        for i in 0..12 {
            memory.append_turn("s1", &Turn::user(format!("turn {i}"))).unwrap();
        }
        let recent = memory.recent_turns("s1", 10).unwrap();
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].text, "turn 2");
        assert_eq!(recent[9].text, "turn 11");
    }

    #[test]
    fn test_sessions_are_isolated() {
        let memory = memory();
        memory.append_turn("s1", &Turn::user("mine")).unwrap();
        memory.append_turn("s2", &Turn::user("theirs")).unwrap();
        assert_eq!(memory.history("s1").unwrap().len(), 1);
        assert_eq!(memory.history("s2").unwrap()[0].text, "theirs");
    }
}
