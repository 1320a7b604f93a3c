pub mod inventory;
pub mod pricing;

pub use inventory::{InventoryLedger, MovementKind, StockMovement};
pub use pricing::discounted_price;
