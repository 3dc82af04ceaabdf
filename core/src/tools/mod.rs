pub mod adapter;
pub mod schema;

pub use adapter::{AdaptedTool, adapt, adapt_all};
pub use schema::{ArgumentError, InputSchema, ToolParameter};
