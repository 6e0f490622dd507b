//! Pluggable ambient environment.
//!
//! The [`EnvironmentManager`] stores request- or thread-scoped values (the
//! current database name, for instance) without threading them through every
//! call. The actual storage strategy is an environment *class*: a set of three
//! class-level functions that the manager validates before installing.
//!
//! Environment classes are described by [`EnvironmentClass`]. Each member is
//! a [`Member`], which can express the shapes a dynamically assembled class
//! may have: missing, explicitly unset, shadowed by a plain value, defined
//! per instance, or defined at class level. Only the last one is usable,
//! except that `scoped_function_for_session` may also be unset.
//!
//! Rust types implementing [`Environment`] always produce a valid class via
//! [`EnvironmentClass::of`].
//!
//! ```
//! use anyblok_core::environment::EnvironmentManager;
//! use anyblok_core::Value;
//!
//! let manager = EnvironmentManager::new();
//! manager.set("dbname", Value::from("prod")).unwrap();
//! assert_eq!(manager.get("dbname", None).unwrap(), Some(Value::from("prod")));
//! assert!(manager.scoped_function_for_session().unwrap().is_none());
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use crate::value::Value;

/// `setter(key, value)`.
pub type SetterFn = fn(&str, Value);
/// `getter(key, default)`.
pub type GetterFn = fn(&str, Option<Value>) -> Option<Value>;
/// Function identifying the current session scope.
pub type ScopedSessionFn = fn() -> String;

/// Errors raised by the environment manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentError {
    /// `get`/`set` called while no environment is installed.
    NoEnvironment,
    /// The class does not define the member at all.
    Missing {
        class: String,
        member: &'static str,
    },
    /// The member is shadowed by something that is not callable.
    NotCallable {
        class: String,
        member: &'static str,
        found: String,
    },
    /// The member is an instance method instead of a class-level function.
    NotClassLevel {
        class: String,
        member: &'static str,
    },
}

impl EnvironmentError {
    /// The offending member name, when the error is about one.
    pub const fn member(&self) -> Option<&'static str> {
        match self {
            EnvironmentError::NoEnvironment => None,
            EnvironmentError::Missing { member, .. }
            | EnvironmentError::NotCallable { member, .. }
            | EnvironmentError::NotClassLevel { member, .. } => Some(member),
        }
    }
}

impl fmt::Display for EnvironmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvironmentError::NoEnvironment => write!(f, "no environment defined"),
            EnvironmentError::Missing { class, member } => {
                write!(f, "environment class {} has no {:?}", class, member)
            }
            EnvironmentError::NotCallable {
                class,
                member,
                found,
            } => write!(
                f,
                "{}.{} must be a class-level function, found {}",
                class, member, found
            ),
            EnvironmentError::NotClassLevel { class, member } => write!(
                f,
                "{}.{} is an instance method, a class-level function is required",
                class, member
            ),
        }
    }
}

impl StdError for EnvironmentError {}

/// Shape of one member of an environment class.
#[derive(Debug, Clone)]
pub enum Member<F> {
    /// Not defined.
    Missing,
    /// Defined and explicitly empty (`None`).
    Unset,
    /// Shadowed by a non-callable value.
    NotCallable(Value),
    /// Defined on instances only.
    Instance(F),
    /// Class-level function.
    Class(F),
}

impl<F: Copy> Member<F> {
    fn require(&self, class: &str, member: &'static str) -> Result<F, EnvironmentError> {
        match self {
            Member::Class(f) => Ok(*f),
            Member::Missing => Err(EnvironmentError::Missing {
                class: class.to_string(),
                member,
            }),
            Member::Unset => Err(EnvironmentError::NotCallable {
                class: class.to_string(),
                member,
                found: "None".to_string(),
            }),
            Member::NotCallable(v) => Err(EnvironmentError::NotCallable {
                class: class.to_string(),
                member,
                found: format!("{} {:?}", v.kind(), v.to_string()),
            }),
            Member::Instance(_) => Err(EnvironmentError::NotClassLevel {
                class: class.to_string(),
                member,
            }),
        }
    }

    fn optional(&self, class: &str, member: &'static str) -> Result<Option<F>, EnvironmentError> {
        match self {
            Member::Unset => Ok(None),
            other => other.require(class, member).map(Some),
        }
    }
}

/// A candidate environment class.
#[derive(Debug, Clone)]
pub struct EnvironmentClass {
    name: String,
    /// `setter(key, value)`.
    pub setter: Member<SetterFn>,
    /// `getter(key, default)`.
    pub getter: Member<GetterFn>,
    /// `scoped_function_for_session`.
    pub scoped_function_for_session: Member<ScopedSessionFn>,
}

impl EnvironmentClass {
    /// A class with every member missing.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            setter: Member::Missing,
            getter: Member::Missing,
            scoped_function_for_session: Member::Missing,
        }
    }

    /// Describe a Rust [`Environment`] implementation.
    pub fn of<E: Environment>() -> Self {
        Self {
            name: E::NAME.to_string(),
            setter: Member::Class(E::setter),
            getter: Member::Class(E::getter),
            scoped_function_for_session: E::SCOPED_FUNCTION_FOR_SESSION
                .map_or(Member::Unset, Member::Class),
        }
    }

    /// Class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the setter member.
    pub fn with_setter(mut self, member: Member<SetterFn>) -> Self {
        self.setter = member;
        self
    }

    /// Replace the getter member.
    pub fn with_getter(mut self, member: Member<GetterFn>) -> Self {
        self.getter = member;
        self
    }

    /// Replace the `scoped_function_for_session` member.
    pub fn with_scoped_function_for_session(mut self, member: Member<ScopedSessionFn>) -> Self {
        self.scoped_function_for_session = member;
        self
    }

    /// Check every member independently, reporting the first failure in
    /// `scoped_function_for_session`, `setter`, `getter` order.
    pub fn validate(&self) -> Result<(), EnvironmentError> {
        self.validated().map(|_| ())
    }

    fn validated(&self) -> Result<Installed, EnvironmentError> {
        let scoped = self
            .scoped_function_for_session
            .optional(&self.name, "scoped_function_for_session")?;
        let setter = self.setter.require(&self.name, "setter")?;
        let getter = self.getter.require(&self.name, "getter")?;
        Ok(Installed {
            name: self.name.clone(),
            setter,
            getter,
            scoped,
        })
    }
}

/// A statically typed environment class.
///
/// Associated functions are class-level by construction.
pub trait Environment: 'static {
    /// Class name used in diagnostics.
    const NAME: &'static str;

    /// Scope function for sessions; `None` when sessions are not scoped.
    const SCOPED_FUNCTION_FOR_SESSION: Option<ScopedSessionFn> = None;

    /// Store `value` under `key`.
    fn setter(key: &str, value: Value);

    /// Read `key`, falling back to `default`.
    fn getter(key: &str, default: Option<Value>) -> Option<Value>;
}

thread_local! {
    static THREAD_VALUES: RefCell<HashMap<String, Value>> = RefCell::new(HashMap::new());
}

/// Default environment: one isolated store per thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadEnvironment;

impl Environment for ThreadEnvironment {
    const NAME: &'static str = "ThreadEnvironment";

    fn setter(key: &str, value: Value) {
        THREAD_VALUES.with(|values| {
            values.borrow_mut().insert(key.to_string(), value);
        });
    }

    fn getter(key: &str, default: Option<Value>) -> Option<Value> {
        THREAD_VALUES.with(|values| values.borrow().get(key).cloned().or(default))
    }
}

/// Holds the installed environment class and delegates to it.
///
/// The manager is an ordinary value: create one at process start and share it
/// by reference (usually behind an `Arc`).
#[derive(Debug)]
pub struct EnvironmentManager {
    environment: RwLock<Option<Installed>>,
}

#[derive(Debug, Clone)]
struct Installed {
    name: String,
    setter: SetterFn,
    getter: GetterFn,
    scoped: Option<ScopedSessionFn>,
}

impl Default for EnvironmentManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentManager {
    /// A manager with [`ThreadEnvironment`] installed.
    pub fn new() -> Self {
        let manager = Self::empty();
        manager.define_environment::<ThreadEnvironment>();
        manager
    }

    /// A manager with no environment installed.
    pub fn empty() -> Self {
        Self {
            environment: RwLock::new(None),
        }
    }

    /// Validate and install an environment class.
    ///
    /// On failure the previously installed class stays in place.
    pub fn define_environment_cls(&self, cls: &EnvironmentClass) -> Result<(), EnvironmentError> {
        let installed = cls.validated()?;
        tracing::debug!(environment = cls.name(), "Installing environment class");
        self.install(installed);
        Ok(())
    }

    /// Install a typed environment.
    pub fn define_environment<E: Environment>(&self) {
        self.install(Installed {
            name: E::NAME.to_string(),
            setter: E::setter,
            getter: E::getter,
            scoped: E::SCOPED_FUNCTION_FOR_SESSION,
        });
    }

    /// Uninstall the current environment.
    pub fn clear_environment(&self) {
        *self
            .environment
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Name of the installed class.
    pub fn environment_name(&self) -> Option<String> {
        self.current().map(|e| e.name)
    }

    /// Store `value` under `key` in the installed environment.
    pub fn set(&self, key: &str, value: Value) -> Result<(), EnvironmentError> {
        let env = self.current().ok_or(EnvironmentError::NoEnvironment)?;
        (env.setter)(key, value);
        Ok(())
    }

    /// Read `key` from the installed environment.
    pub fn get(&self, key: &str, default: Option<Value>) -> Result<Option<Value>, EnvironmentError> {
        let env = self.current().ok_or(EnvironmentError::NoEnvironment)?;
        Ok((env.getter)(key, default))
    }

    /// The installed class's session scope function, if any.
    pub fn scoped_function_for_session(&self) -> Result<Option<ScopedSessionFn>, EnvironmentError> {
        let env = self.current().ok_or(EnvironmentError::NoEnvironment)?;
        Ok(env.scoped)
    }

    fn current(&self) -> Option<Installed> {
        self.environment
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn install(&self, installed: Installed) {
        *self
            .environment
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(installed);
    }
}
