use pest_consume::{match_nodes, Error, Parser};

use super::path::ClassPath;
use crate::runner::ds::error::ClassError;

#[derive(Parser)]
#[grammar = "parser/path_grammar.pest"] // relative to src
pub struct PathParser;

type ParseResult<T> = std::result::Result<T, Error<Rule>>;
type Node<'i> = pest_consume::Node<'i, Rule, ()>;

#[pest_consume::parser]
impl PathParser {
    #[allow(non_snake_case)]
    fn EOI(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn identifier(input: Node) -> ParseResult<String> {
        Ok(input.as_str().to_string())
    }

    fn segments(input: Node) -> ParseResult<Vec<String>> {
        Ok(match_nodes!(input.into_children();
            [identifier(ids)..] => ids.collect(),
        ))
    }

    fn path(input: Node) -> ParseResult<Vec<String>> {
        Ok(match_nodes!(input.into_children();
            [segments(s), EOI(_)] => s,
        ))
    }
}

impl PathParser {
    /// Parse a dotted path. The empty string is the root path.
    pub fn parse_path(path: &str) -> Result<ClassPath, ClassError> {
        if path.is_empty() {
            return Ok(ClassPath::root());
        }
        let to_class_error = |e: Error<Rule>| ClassError::InvalidPath {
            path: path.to_string(),
            reason: e.variant.message().to_string(),
        };
        let nodes = PathParser::parse(Rule::path, path).map_err(to_class_error)?;
        let node = nodes.single().map_err(to_class_error)?;
        let segments = PathParser::path(node).map_err(to_class_error)?;
        Ok(ClassPath::from_segments(segments))
    }
}
