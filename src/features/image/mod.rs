/// 处理管线：校验 -> 引擎调用 -> 响应组装
pub mod handler;
/// 请求内的数据模型与输入校验
pub mod types;

pub use handler::create_image_router;
pub use types::{AllowedMediaType, ProcessedImage, UploadedImage};
