pub mod adapter;
pub mod ddl;
pub mod params;
pub mod query;
pub mod row;
