pub mod campaign;
pub mod identity;
pub mod merkle;
