pub mod entity;
pub mod orm;
pub mod repository;
