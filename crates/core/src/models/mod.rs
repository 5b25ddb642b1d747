pub mod asset;
pub mod price;
pub mod response;
pub mod settings;
