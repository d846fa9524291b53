//! Documentation comment blocks: vocabulary, parser and writer

pub mod block;
pub mod parser;
pub mod vocab;
pub mod writer;

pub use block::{
    AnnotationOptions, Annotations, CommentBlock, CommentParameter, CommentTag, PartMap,
};
pub use parser::{CommentBlockParser, CommentBlocks, RawComment};
pub use vocab::{AnnotatedPart, Annotation, Tag};
pub use writer::CommentBlockWriter;
