pub mod profile;

pub mod prelude {
    pub use super::profile::*;
}
