//! Transactional services that compose repository calls and the engines.

pub mod baseline;
pub mod cycles;
pub mod inventory;
pub mod orders;

pub use baseline::{CycleBaseline, FixedCycleBaseline, SqlCycleBaseline};
pub use cycles::{CycleError, ProfitCycleManager};
pub use inventory::{InventoryError, InventoryService};
pub use orders::{NewOrder, OrderError, OrderService};
