//! Collection phase: declarations accumulate as plain data.
//!
//! Nothing is resolved here. Registering only validates names so that mistakes
//! surface at the call site; inheritance, columns and method layering are all
//! resolved once by the registry build.

use anyblok_core::identifiers::{validate_dotted_name, validate_identifier};
use anyblok_core::{Error, Result};

use crate::body::{Category, ClassBody};

/// Names accepted for Core layers.
pub const CORE_NAMES: [&str; 2] = ["Base", "SqlBase"];

/// One registered contribution.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub(crate) category: Category,
    pub(crate) name: String,
    pub(crate) body: ClassBody,
}

impl Declaration {
    /// Category of the contribution.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Dotted name of the contribution.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared body.
    pub fn body(&self) -> &ClassBody {
        &self.body
    }
}

/// An ordered bag of declarations, usually contributed by several bloks.
///
/// Registration order matters: among contributions sharing a name, the last
/// registered becomes the most derived layer.
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    entries: Vec<Declaration>,
}

impl Declarations {
    /// An empty set of declarations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a contribution.
    pub fn register(
        &mut self,
        category: Category,
        name: impl Into<String>,
        body: ClassBody,
    ) -> Result<&mut Self> {
        let name = name.into();
        validate_dotted_name(&name)?;
        validate_body(category, &name, &body)?;

        tracing::debug!(
            category = %category,
            name = %name,
            columns = body.columns.len(),
            bases = body.bases.len(),
            "Registered declaration"
        );
        self.entries.push(Declaration {
            category,
            name,
            body,
        });
        Ok(self)
    }

    /// Queue a Model contribution.
    pub fn register_model(&mut self, name: impl Into<String>, body: ClassBody) -> Result<&mut Self> {
        self.register(Category::Model, name, body)
    }

    /// Queue a Mixin contribution.
    pub fn register_mixin(&mut self, name: impl Into<String>, body: ClassBody) -> Result<&mut Self> {
        self.register(Category::Mixin, name, body)
    }

    /// Queue a Core layer (`Base` or `SqlBase`).
    pub fn register_core(&mut self, name: impl Into<String>, body: ClassBody) -> Result<&mut Self> {
        self.register(Category::Core, name, body)
    }

    /// Append every declaration of `other`, keeping its order.
    pub fn extend(&mut self, other: Declarations) -> &mut Self {
        self.entries.extend(other.entries);
        self
    }

    /// Registered contributions, in registration order.
    pub fn entries(&self) -> &[Declaration] {
        &self.entries
    }

    /// Number of contributions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_body(category: Category, name: &str, body: &ClassBody) -> Result<()> {
    if category == Category::Core {
        if !CORE_NAMES.contains(&name) {
            return Err(Error::InvalidName {
                name: name.to_string(),
                reason: "Core layers must be named Base or SqlBase",
            });
        }
        if !body.columns.is_empty() || !body.bases.is_empty() || body.table_name.is_some() {
            return Err(Error::invalid_argument(format!(
                "Core.{} may only declare attributes, methods and hooks",
                name
            )));
        }
    }

    for field in &body.columns {
        validate_identifier(&field.name)?;
        if let Some(fk) = &field.column.foreign_key {
            validate_dotted_name(&fk.model)?;
            validate_identifier(&fk.column)?;
        }
    }
    for base in &body.bases {
        validate_dotted_name(&base.name)?;
    }
    for method in body.methods.keys().chain(body.class_methods.keys()) {
        validate_identifier(method)?;
    }
    if let Some(table) = &body.table_name {
        validate_identifier(table)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Base;
    use anyblok_core::Column;

    #[test]
    fn test_register_keeps_order() {
        let mut decls = Declarations::new();
        decls
            .register_model("Test", ClassBody::new())
            .unwrap()
            .register_mixin("MixinName", ClassBody::new())
            .unwrap();
        let names: Vec<&str> = decls.entries().iter().map(Declaration::name).collect();
        assert_eq!(names, vec!["Test", "MixinName"]);
    }

    #[test]
    fn test_invalid_names() {
        let mut decls = Declarations::new();
        assert!(matches!(
            decls.register_model("Bad..Name", ClassBody::new()),
            Err(Error::InvalidName { .. })
        ));
        assert!(matches!(
            decls.register_core("Other", ClassBody::new()),
            Err(Error::InvalidName { .. })
        ));
        assert!(matches!(
            decls.register_model("Test", ClassBody::new().column("bad name", Column::string())),
            Err(Error::InvalidName { .. })
        ));
        assert!(decls.is_empty());
    }

    #[test]
    fn test_core_rejects_columns_and_bases() {
        let mut decls = Declarations::new();
        assert!(decls
            .register_core("Base", ClassBody::new().column("id", Column::integer()))
            .is_err());
        assert!(decls
            .register_core("SqlBase", ClassBody::new().inherit(Base::mixin("M")))
            .is_err());
        assert!(decls.register_core("SqlBase", ClassBody::new()).is_ok());
    }

    #[test]
    fn test_extend() {
        let mut first = Declarations::new();
        first.register_model("A", ClassBody::new()).unwrap();
        let mut second = Declarations::new();
        second.register_model("B", ClassBody::new()).unwrap();
        first.extend(second);
        assert_eq!(first.len(), 2);
        assert_eq!(first.entries()[1].name(), "B");
    }
}
