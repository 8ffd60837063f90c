/// x-api-key 共享密钥校验
pub mod api_key;

pub use api_key::{API_KEY_HEADER, api_key_middleware, verify_api_key};
