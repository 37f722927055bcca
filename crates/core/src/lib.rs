//! Domain types and pure logic for the household ledger: money, month keys,
//! transactions, the budget-plan model and the dashboard builder. Everything
//! here is side-effect free; IO lives in the import, storage and app crates.

pub mod budget;
pub mod dashboard;
pub mod model;
pub mod money;
pub mod month;

pub use budget::{BudgetPlan, BudgetPlanInput, GroupKey, LineItem, ManualCell, ValidationError};
pub use dashboard::{build_monthly_dashboard, DashboardConfig, DashboardView, ValueSource};
pub use model::{
    BatchStatus, DictionaryRule, ImportBatch, MatchType, SourceType, Transaction, UNCATEGORIZED,
};
pub use money::Money;
pub use month::{MonthKey, MonthKeyError};
