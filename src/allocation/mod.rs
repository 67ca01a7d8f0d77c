//! Identifier allocation for backends that require explicit ids

pub mod lun_id;

pub use lun_id::{LunIdPool, LunIdRange, LunInventory, LUN_SCAN_WINDOW};
