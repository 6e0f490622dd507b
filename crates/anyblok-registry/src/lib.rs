//! Declaration registry for AnyBlok.
//!
//! Components contribute Models, Mixins and Core layers as plain data through
//! [`Declarations`]. [`Registry::build`] resolves the whole set once:
//!
//! - contributions sharing a name are layered, the last registered being the
//!   most derived;
//! - bases are resolved across names with a C3 linearisation, cycles and
//!   unknown bases abort the build;
//! - Core `SqlBase` and `Base` layers are appended to every model;
//! - columns are merged and materialised into tables on the connection.
//!
//! The resolved models are then reached by dotted name:
//!
//! ```ignore
//! let test = registry.get("Test")?;
//! let record = test.insert(values! { "name" => "test" })?;
//! assert_eq!(test.query().first()?, Some(record));
//! ```

pub mod args;
pub mod body;
pub mod chain;
pub mod config;
pub mod declarations;
pub mod model;
pub mod query;
pub mod record;
pub mod registry;
mod resolve;

pub use args::Args;
pub use body::{Base, Category, ClassBody};
pub use chain::{
    ClassCall, ClassMethod, InitializeCall, InitializeHook, InsertCall, InsertHook, InstanceCall,
    InstanceMethod, Layer,
};
pub use config::RegistryConfig;
pub use declarations::{CORE_NAMES, Declaration, Declarations};
pub use model::{ModelClass, ModelHandle};
pub use query::Query;
pub use record::Record;
pub use registry::{Registry, RegistryBuilder};
