// Per-protocol account payloads.

use super::proto::{TypedMessage, VlessAccount, VmessAccount};

/// Protocol-specific account carried by an Xray user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Account {
    Vless { id: String, flow: String },
    Vmess { id: String },
}

impl Account {
    pub fn vless(id: impl Into<String>, flow: impl Into<String>) -> Self {
        Self::Vless {
            id: id.into(),
            flow: flow.into(),
        }
    }

    pub fn vmess(id: impl Into<String>) -> Self {
        Self::Vmess { id: id.into() }
    }

    /// Encode as the `TypedMessage` Xray expects in `User.account`.
    ///
    /// A blank vless flow is sent as the empty string (plain VLESS).
    pub fn to_typed_message(&self) -> TypedMessage {
        match self {
            Self::Vless { id, flow } => TypedMessage::pack(
                VlessAccount::TYPE_NAME,
                &VlessAccount {
                    id: id.clone(),
                    flow: flow.trim().to_owned(),
                    encryption: String::new(),
                },
            ),
            Self::Vmess { id } => {
                TypedMessage::pack(VmessAccount::TYPE_NAME, &VmessAccount { id: id.clone() })
            }
        }
    }
}
