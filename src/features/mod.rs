/// x-api-key 鉴权
pub mod auth;
/// 根路径与健康检查
pub mod health;
/// 图片上传与背景移除
pub mod image;
/// 抠图引擎抽象与实现
pub mod remover;
