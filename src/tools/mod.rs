//! Tool System - tool descriptors, parameter schemas, and catalog loading

mod catalog;
mod definition;
mod report;
mod schema;

pub use catalog::ToolCatalog;
pub use definition::{ToolCategory, ToolDescriptor, ToolExample};
pub use report::CatalogReport;
pub use schema::ParameterSchema;
