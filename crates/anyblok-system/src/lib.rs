//! System models shipped with AnyBlok.
//!
//! Currently this is `System.Sequence`, a persisted model whose rows each own
//! a storage counter and format the values it issues.
//!
//! ```ignore
//! let mut declarations = Declarations::new();
//! anyblok_system::register(&mut declarations)?;
//! let registry = Registry::build(&declarations, connection)?;
//!
//! let sequences = Sequence::new(&registry)?;
//! let mut so = sequences.insert(values! { "code" => "SO", "prefix" => "SO" })?;
//! assert_eq!(Sequence::nextval(&mut so)?, "SO_1");
//! ```

pub mod sequence;

pub use sequence::Sequence;

use anyblok_core::Result;
use anyblok_registry::Declarations;

/// Register every system model.
pub fn register(declarations: &mut Declarations) -> Result<()> {
    sequence::register(declarations)
}
