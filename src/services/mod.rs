pub mod collaborators;
pub mod crypto_service;
pub mod dispatch;
pub mod localization_service;
pub mod message_service;
pub mod recipient_service;
pub mod template;
