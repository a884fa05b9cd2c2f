#[macro_use]
extern crate serde;

#[macro_use]
extern crate async_trait;

#[macro_use]
extern crate async_recursion;

#[macro_use]
extern crate log;

#[macro_use]
extern crate stampede_result;

mod drivers;
pub use drivers::*;

mod read_through;
pub use read_through::ReadThrough;

pub mod invalidation;
