//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 建立在缓存客户端之上的业务读写服务。

pub mod login;
pub mod shop;
pub mod shop_type;

pub use login::LoginService;
pub use shop::ShopService;
pub use shop_type::ShopTypeService;
