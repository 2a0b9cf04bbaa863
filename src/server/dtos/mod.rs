pub mod health_dto;
pub mod proxy_dto;
pub mod resolve_dto;
