use thiserror::Error;

use crate::qname::QName;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("flag '{name}' is already defined on this node")]
    DuplicateFlag { name: QName },

    #[error("node {0} does not exist in this document")]
    UnknownNode(usize),

    #[error("a {kind} node cannot own {child} children")]
    InvalidParent {
        kind: &'static str,
        child: &'static str,
    },
}
