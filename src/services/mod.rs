pub mod allocation;
pub mod locks;

pub use allocation::{
    AllocationEngine, Consumption, DeletePolicy, EditScrap, NewScrap, RollDetails,
};
pub use locks::{ItemGuard, ItemLocks};
