pub mod postgres;
pub mod sqlite;
pub mod table;
pub mod traits;
