//! Atomic datatypes for Metaschema values.
//!
//! Every leaf datatype is described by a [`DataType`] tag that acts as its
//! adapter: it parses lexical text into an [`AtomicValue`], formats values
//! back to their canonical text, and declares the JSON shape external
//! serializers should use.
//!
//! # Key Types
//!
//! - [`DataType`]: one of the built-in leaf datatypes (`string`, `integer`, `date`, ...)
//! - [`AtomicValue`]: an immutable value tagged with the datatype that produced it
//! - [`Value`]: the underlying representation shared by related datatypes
//!
//! # Example
//!
//! ```
//! use metaschema_datatypes::DataType;
//!
//! let value = DataType::Decimal.parse("1.50").unwrap();
//! assert_eq!(value.to_string(), "1.50");
//! assert!(DataType::PositiveInteger.parse("0").is_err());
//! ```

mod datatype;
mod error;
mod temporal;
mod value;

pub use datatype::{DataType, JsonType};
pub use error::DataTypeError;
pub use temporal::{DateTimeValue, DateValue};
pub use value::{AtomicValue, Value};
