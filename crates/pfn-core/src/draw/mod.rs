mod interface;
mod provably_fair;

pub use interface::*;
pub use provably_fair::*;
