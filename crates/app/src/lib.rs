//! Service layer tying the pure core, the XLSX intake pipeline and SQLite
//! storage together. Every function here is owner-scoped and returns
//! `ServiceResult`; callers decide how to surface the error taxonomy.

pub mod budgets;
pub mod dashboard;
pub mod error;
pub mod imports;
pub mod pagination;
pub mod reports;

pub use error::{ServiceError, ServiceResult};
pub use pagination::{Page, Pagination};
