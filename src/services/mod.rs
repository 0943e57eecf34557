pub mod content;
pub mod embedding;
pub mod feed;
pub mod interest;
pub mod vector_db;
