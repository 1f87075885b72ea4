//! Protobuf messages exchanged with peers and the ordering service.
//!
//! Only the fields this client reads or writes are declared; field tags match
//! the published network schemas so the encodings are interchangeable.
//! Policy fields are carried as pre-serialized bytes, which is wire-identical
//! to the embedded message.

use prost::{DecodeError, Message};

pub mod msp {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SerializedIdentity {
        #[prost(string, tag = "1")]
        pub mspid: String,
        #[prost(bytes = "vec", tag = "2")]
        pub id_bytes: Vec<u8>,
    }
}

pub mod common {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Status {
        Unknown = 0,
        Success = 200,
        BadRequest = 400,
        Forbidden = 403,
        NotFound = 404,
        RequestEntityTooLarge = 413,
        InternalServerError = 500,
        NotImplemented = 501,
        ServiceUnavailable = 503,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum HeaderType {
        Message = 0,
        Config = 1,
        ConfigUpdate = 2,
        EndorserTransaction = 3,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ChannelHeader {
        #[prost(int32, tag = "1")]
        pub r#type: i32,
        #[prost(int32, tag = "2")]
        pub version: i32,
        #[prost(message, optional, tag = "3")]
        pub timestamp: Option<::prost_types::Timestamp>,
        #[prost(string, tag = "4")]
        pub channel_id: String,
        #[prost(string, tag = "5")]
        pub tx_id: String,
        #[prost(uint64, tag = "6")]
        pub epoch: u64,
        #[prost(bytes = "vec", tag = "7")]
        pub extension: Vec<u8>,
        #[prost(bytes = "vec", tag = "8")]
        pub tls_cert_hash: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SignatureHeader {
        #[prost(bytes = "vec", tag = "1")]
        pub creator: Vec<u8>,
        #[prost(bytes = "vec", tag = "2")]
        pub nonce: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Header {
        #[prost(bytes = "vec", tag = "1")]
        pub channel_header: Vec<u8>,
        #[prost(bytes = "vec", tag = "2")]
        pub signature_header: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Payload {
        #[prost(message, optional, tag = "1")]
        pub header: Option<Header>,
        #[prost(bytes = "vec", tag = "2")]
        pub data: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Envelope {
        #[prost(bytes = "vec", tag = "1")]
        pub payload: Vec<u8>,
        #[prost(bytes = "vec", tag = "2")]
        pub signature: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CollectionConfigPackage {
        #[prost(message, repeated, tag = "1")]
        pub config: Vec<CollectionConfig>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CollectionConfig {
        #[prost(message, optional, tag = "1")]
        pub static_collection_config: Option<StaticCollectionConfig>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StaticCollectionConfig {
        #[prost(string, tag = "1")]
        pub name: String,
        /// Encoded `CollectionPolicyConfig`.
        #[prost(bytes = "vec", tag = "2")]
        pub member_orgs_policy: Vec<u8>,
        #[prost(int32, tag = "3")]
        pub required_peer_count: i32,
        #[prost(int32, tag = "4")]
        pub maximum_peer_count: i32,
        #[prost(uint64, tag = "5")]
        pub block_to_live: u64,
        #[prost(bool, tag = "6")]
        pub member_only_read: bool,
        #[prost(bool, tag = "7")]
        pub member_only_write: bool,
        /// Encoded `ApplicationPolicy`.
        #[prost(bytes = "vec", tag = "8")]
        pub endorsement_policy: Vec<u8>,
    }
}

pub mod peer {
    use std::collections::HashMap;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum ChaincodeType {
        Undefined = 0,
        Golang = 1,
        Node = 2,
        Car = 3,
        Java = 4,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ChaincodeId {
        #[prost(string, tag = "1")]
        pub path: String,
        #[prost(string, tag = "2")]
        pub name: String,
        #[prost(string, tag = "3")]
        pub version: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ChaincodeInput {
        #[prost(bytes = "vec", repeated, tag = "1")]
        pub args: Vec<Vec<u8>>,
        #[prost(map = "string, bytes", tag = "2")]
        pub decorations: HashMap<String, Vec<u8>>,
        #[prost(bool, tag = "3")]
        pub is_init: bool,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ChaincodeSpec {
        #[prost(enumeration = "ChaincodeType", tag = "1")]
        pub r#type: i32,
        #[prost(message, optional, tag = "2")]
        pub chaincode_id: Option<ChaincodeId>,
        #[prost(message, optional, tag = "3")]
        pub input: Option<ChaincodeInput>,
        #[prost(int32, tag = "4")]
        pub timeout: i32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ChaincodeInvocationSpec {
        #[prost(message, optional, tag = "1")]
        pub chaincode_spec: Option<ChaincodeSpec>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ChaincodeHeaderExtension {
        #[prost(message, optional, tag = "2")]
        pub chaincode_id: Option<ChaincodeId>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ChaincodeProposalPayload {
        #[prost(bytes = "vec", tag = "1")]
        pub input: Vec<u8>,
        #[prost(map = "string, bytes", tag = "2")]
        pub transient_map: HashMap<String, Vec<u8>>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Proposal {
        #[prost(bytes = "vec", tag = "1")]
        pub header: Vec<u8>,
        #[prost(bytes = "vec", tag = "2")]
        pub payload: Vec<u8>,
        #[prost(bytes = "vec", tag = "3")]
        pub extension: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SignedProposal {
        #[prost(bytes = "vec", tag = "1")]
        pub proposal_bytes: Vec<u8>,
        #[prost(bytes = "vec", tag = "2")]
        pub signature: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Response {
        #[prost(int32, tag = "1")]
        pub status: i32,
        #[prost(string, tag = "2")]
        pub message: String,
        #[prost(bytes = "vec", tag = "3")]
        pub payload: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Endorsement {
        #[prost(bytes = "vec", tag = "1")]
        pub endorser: Vec<u8>,
        #[prost(bytes = "vec", tag = "2")]
        pub signature: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ProposalResponse {
        #[prost(int32, tag = "1")]
        pub version: i32,
        #[prost(message, optional, tag = "2")]
        pub timestamp: Option<::prost_types::Timestamp>,
        #[prost(message, optional, tag = "4")]
        pub response: Option<Response>,
        #[prost(bytes = "vec", tag = "5")]
        pub payload: Vec<u8>,
        #[prost(message, optional, tag = "6")]
        pub endorsement: Option<Endorsement>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ProposalResponsePayload {
        #[prost(bytes = "vec", tag = "1")]
        pub proposal_hash: Vec<u8>,
        #[prost(bytes = "vec", tag = "2")]
        pub extension: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ChaincodeEndorsedAction {
        #[prost(bytes = "vec", tag = "1")]
        pub proposal_response_payload: Vec<u8>,
        #[prost(message, repeated, tag = "2")]
        pub endorsements: Vec<Endorsement>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ChaincodeActionPayload {
        #[prost(bytes = "vec", tag = "1")]
        pub chaincode_proposal_payload: Vec<u8>,
        #[prost(message, optional, tag = "2")]
        pub action: Option<ChaincodeEndorsedAction>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TransactionAction {
        #[prost(bytes = "vec", tag = "1")]
        pub header: Vec<u8>,
        #[prost(bytes = "vec", tag = "2")]
        pub payload: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Transaction {
        #[prost(message, repeated, tag = "1")]
        pub actions: Vec<TransactionAction>,
    }
}

pub mod orderer {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct BroadcastResponse {
        #[prost(enumeration = "super::common::Status", tag = "1")]
        pub status: i32,
        #[prost(string, tag = "2")]
        pub info: String,
    }
}

pub mod lifecycle {
    use std::collections::HashMap;

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct InstallChaincodeArgs {
        #[prost(bytes = "vec", tag = "1")]
        pub chaincode_install_package: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct InstallChaincodeResult {
        #[prost(string, tag = "1")]
        pub package_id: String,
        #[prost(string, tag = "2")]
        pub label: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct QueryInstalledChaincodesArgs {}

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct QueryInstalledChaincodesResult {
        #[prost(message, repeated, tag = "1")]
        pub installed_chaincodes: Vec<InstalledChaincode>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct InstalledChaincode {
        #[prost(string, tag = "1")]
        pub package_id: String,
        #[prost(string, tag = "2")]
        pub label: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ChaincodeSource {
        #[prost(oneof = "chaincode_source::Type", tags = "1, 2")]
        pub r#type: Option<chaincode_source::Type>,
    }

    pub mod chaincode_source {
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Unavailable {}

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Local {
            #[prost(string, tag = "1")]
            pub package_id: String,
        }

        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Type {
            #[prost(message, tag = "1")]
            Unavailable(Unavailable),
            #[prost(message, tag = "2")]
            LocalPackage(Local),
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ApproveChaincodeDefinitionForMyOrgArgs {
        #[prost(int64, tag = "1")]
        pub sequence: i64,
        #[prost(string, tag = "2")]
        pub name: String,
        #[prost(string, tag = "3")]
        pub version: String,
        #[prost(string, tag = "4")]
        pub endorsement_plugin: String,
        #[prost(string, tag = "5")]
        pub validation_plugin: String,
        #[prost(bytes = "vec", tag = "6")]
        pub validation_parameter: Vec<u8>,
        #[prost(message, optional, tag = "7")]
        pub collections: Option<super::common::CollectionConfigPackage>,
        #[prost(bool, tag = "8")]
        pub init_required: bool,
        #[prost(message, optional, tag = "9")]
        pub source: Option<ChaincodeSource>,
    }

    /// Shared by `CommitChaincodeDefinitionArgs` and `CheckCommitReadinessArgs`,
    /// whose schemas are field-for-field identical.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ChaincodeDefinitionArgs {
        #[prost(int64, tag = "1")]
        pub sequence: i64,
        #[prost(string, tag = "2")]
        pub name: String,
        #[prost(string, tag = "3")]
        pub version: String,
        #[prost(string, tag = "4")]
        pub endorsement_plugin: String,
        #[prost(string, tag = "5")]
        pub validation_plugin: String,
        #[prost(bytes = "vec", tag = "6")]
        pub validation_parameter: Vec<u8>,
        #[prost(message, optional, tag = "7")]
        pub collections: Option<super::common::CollectionConfigPackage>,
        #[prost(bool, tag = "8")]
        pub init_required: bool,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CheckCommitReadinessResult {
        #[prost(map = "string, bool", tag = "1")]
        pub approvals: HashMap<String, bool>,
    }
}

impl peer::SignedProposal {
    pub fn decode_proposal(&self) -> Result<peer::Proposal, DecodeError> {
        peer::Proposal::decode(self.proposal_bytes.as_slice())
    }
}

impl peer::Proposal {
    pub fn decode_header(&self) -> Result<common::Header, DecodeError> {
        common::Header::decode(self.header.as_slice())
    }

    pub fn decode_payload(&self) -> Result<peer::ChaincodeProposalPayload, DecodeError> {
        peer::ChaincodeProposalPayload::decode(self.payload.as_slice())
    }

    pub fn decode_invocation(&self) -> Result<peer::ChaincodeInvocationSpec, DecodeError> {
        let payload = self.decode_payload()?;
        peer::ChaincodeInvocationSpec::decode(payload.input.as_slice())
    }
}

impl common::Header {
    pub fn decode_channel_header(&self) -> Result<common::ChannelHeader, DecodeError> {
        common::ChannelHeader::decode(self.channel_header.as_slice())
    }

    pub fn decode_signature_header(&self) -> Result<common::SignatureHeader, DecodeError> {
        common::SignatureHeader::decode(self.signature_header.as_slice())
    }
}

impl peer::ChaincodeInvocationSpec {
    /// Invocation arguments, function name first.
    pub fn args(&self) -> &[Vec<u8>] {
        self.chaincode_spec
            .as_ref()
            .and_then(|spec| spec.input.as_ref())
            .map_or(&[], |input| input.args.as_slice())
    }
}
