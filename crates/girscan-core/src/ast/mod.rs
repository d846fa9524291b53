//! The introspection model: node arena, namespaces and type references

pub mod callable;
pub mod model;
pub mod namespace;
pub mod node;
pub mod types;

pub use callable::{Callable, Direction, Parameter, Return, Scope, Transfer, TypeContainer};
pub use model::{Model, WalkFn};
pub use namespace::{Include, Namespace, NamespaceId};
pub use node::{
    Alias, Boxed, Callback, Class, Compound, Constant, Contents, Enumeration, Field, Function,
    FunctionMacro, Interface, Member, Metadata, Node, NodeId, NodeKind, Property, Registration,
    Signal, VFunction,
};
pub use types::{ArrayType, Type, TypeKind, TypeTarget};
