pub mod body;
pub mod request;

pub use body::{parse_json_body, JsonBody};
pub use request::ResourceRequest;
