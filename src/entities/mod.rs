// Entity Models
// "Identity persists, values change"
//
// An agency is identified by its code; the headings naming it are values
// collected as sections reference it.

pub mod agency;

pub use agency::{Agency, AgencyRegistry};
