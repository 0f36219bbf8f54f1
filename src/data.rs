pub mod columns;
pub mod trips;

pub use columns::ColumnKind;
pub use trips::DeclaredSchema;
