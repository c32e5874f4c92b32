pub mod market;
pub mod notification;
pub mod profile;
pub mod property;
pub mod trading;

pub use market::*;
pub use notification::*;
pub use profile::*;
pub use property::*;
pub use trading::*;
