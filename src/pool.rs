//! Thread-local parser pooling.
//!
//! Every edit reparses the spliced text, so a single edit call can create
//! several trees. The pool keeps one C# parser per thread and reuses it for
//! all of them.

use crate::cs::{CSharpParser, TreeSitterError};
use std::cell::RefCell;

thread_local! {
    static CSHARP_PARSER: RefCell<Option<CSharpParser>> = const { RefCell::new(None) };
}

/// Execute function with pooled parser instance.
///
/// # Example
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use scaffold_patcher::pool::with_parser;
///
/// let tree = with_parser(|parser| parser.parse("class Blog {}"))??;
/// assert_eq!(tree.root_node().kind(), "compilation_unit");
/// # Ok(())
/// # }
/// ```
pub fn with_parser<F, R>(f: F) -> Result<R, TreeSitterError>
where
    F: FnOnce(&mut CSharpParser) -> R,
{
    CSHARP_PARSER.with(|cell| {
        let mut opt = cell.borrow_mut();
        if opt.is_none() {
            *opt = Some(CSharpParser::new()?);
        }
        Ok(f(opt.as_mut().expect("parser was just initialized above")))
    })
}
