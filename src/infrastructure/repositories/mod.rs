//! Repository implementations using SeaORM

pub mod category_repository;
pub mod item_repository;

pub use category_repository::SeaOrmCategoryRepository;
pub use item_repository::SeaOrmItemRepository;
