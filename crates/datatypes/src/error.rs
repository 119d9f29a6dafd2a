use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataTypeError {
    #[error("'{text}' is not a valid {datatype}")]
    InvalidLexical { datatype: &'static str, text: String },

    #[error("value {value} is out of range for {datatype}")]
    OutOfRange { datatype: &'static str, value: String },

    #[error("a {representation} value cannot be stored as {datatype}")]
    Representation {
        datatype: &'static str,
        representation: &'static str,
    },

    #[error("values of type {left} and {right} are not comparable")]
    Incomparable {
        left: &'static str,
        right: &'static str,
    },
}

impl DataTypeError {
    pub fn invalid(datatype: &'static str, text: impl Into<String>) -> Self {
        Self::InvalidLexical {
            datatype,
            text: text.into(),
        }
    }
}
