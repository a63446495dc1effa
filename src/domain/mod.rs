pub mod entities;
pub mod error;
pub mod roles;
pub mod validation;
