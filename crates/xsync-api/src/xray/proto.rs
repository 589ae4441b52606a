// Protobuf messages for the subset of Xray-core's API used by xsync.
//
// Field numbers follow `common/serial/typed_message.proto`,
// `common/protocol/user.proto`, `proxy/vless/account.proto`,
// `proxy/vmess/account.proto` and `app/proxyman/command/command.proto`.

/// Fully-qualified gRPC method path for `HandlerService.AlterInbound`.
pub const ALTER_INBOUND_PATH: &str = "/xray.app.proxyman.command.HandlerService/AlterInbound";

/// A protobuf message serialized together with its fully-qualified type name.
#[derive(Clone, PartialEq, prost::Message)]
pub struct TypedMessage {
    #[prost(string, tag = "1")]
    pub r#type: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

impl TypedMessage {
    /// Wrap `message`, recording `type_name` as its protobuf full name.
    pub fn pack<M: prost::Message>(type_name: &str, message: &M) -> Self {
        Self {
            r#type: type_name.to_owned(),
            value: message.encode_to_vec(),
        }
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct User {
    #[prost(uint32, tag = "1")]
    pub level: u32,
    #[prost(string, tag = "2")]
    pub email: String,
    #[prost(message, optional, tag = "3")]
    pub account: Option<TypedMessage>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VlessAccount {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub flow: String,
    #[prost(string, tag = "3")]
    pub encryption: String,
}

impl VlessAccount {
    pub const TYPE_NAME: &'static str = "xray.proxy.vless.Account";
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VmessAccount {
    #[prost(string, tag = "1")]
    pub id: String,
}

impl VmessAccount {
    pub const TYPE_NAME: &'static str = "xray.proxy.vmess.Account";
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AddUserOperation {
    #[prost(message, optional, tag = "1")]
    pub user: Option<User>,
}

impl AddUserOperation {
    pub const TYPE_NAME: &'static str = "xray.app.proxyman.command.AddUserOperation";
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RemoveUserOperation {
    #[prost(string, tag = "1")]
    pub email: String,
}

impl RemoveUserOperation {
    pub const TYPE_NAME: &'static str = "xray.app.proxyman.command.RemoveUserOperation";
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AlterInboundRequest {
    #[prost(string, tag = "1")]
    pub tag: String,
    #[prost(message, optional, tag = "2")]
    pub operation: Option<TypedMessage>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AlterInboundResponse {}

#[cfg(test)]
mod tests {
    use prost::Message;

    use super::*;

    #[test]
    fn typed_message_roundtrips_inner_payload() {
        let account = VmessAccount {
            id: "b831381d-6324-4d53-ad4f-8cda48b30811".into(),
        };
        let typed = TypedMessage::pack(VmessAccount::TYPE_NAME, &account);
        assert_eq!(typed.r#type, "xray.proxy.vmess.Account");

        let decoded = VmessAccount::decode(typed.value.as_slice()).expect("valid protobuf");
        assert_eq!(decoded, account);
    }

    #[test]
    fn alter_inbound_request_encodes_tag_as_field_one() {
        let req = AlterInboundRequest {
            tag: "in".into(),
            operation: None,
        };
        // field 1, wire type 2 (length-delimited), len 2, "in"
        assert_eq!(req.encode_to_vec(), vec![0x0a, 0x02, b'i', b'n']);
    }
}
