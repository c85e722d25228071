use serde::Serialize;
use std::fmt;

/// The backend pools a request can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Chat,
    Text2Sql,
    Embed,
    Rerank,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Chat, Role::Text2Sql, Role::Embed, Role::Rerank];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Chat => "chat",
            Role::Text2Sql => "text2sql",
            Role::Embed => "embed",
            Role::Rerank => "rerank",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
