//! JMAP wire protocol (RFC 8620 core, RFC 8621 mail)

pub mod method;
pub mod request;
pub mod response;

pub use method::Method;
pub use request::{CallRef, CreationId, Invocation, Request, RequestBuilder, ResultReference};
pub use response::{GetResponse, MethodResponse, QueryResponse, Response, SetError, SetResponse};

pub const CORE_CAPABILITY: &str = "urn:ietf:params:jmap:core";
pub const MAIL_CAPABILITY: &str = "urn:ietf:params:jmap:mail";
pub const SUBMISSION_CAPABILITY: &str = "urn:ietf:params:jmap:submission";
