use std::ops::Range;

use crate::error::Result;
use crate::parser::lexer::{Lexer, Token};
use crate::types::ObjRef;

/// An `N G R` triple found in raw object syntax
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSpan {
    /// From the first digit of N to the end of `R`
    pub span: Range<usize>,
    pub target: ObjRef,
}

/// Locate every indirect reference in `bytes`.
///
/// Works on tokens, so digits inside strings, names, or bare numbers
/// are never reported. Stream data must not be passed in.
pub fn reference_spans(bytes: &[u8]) -> Result<Vec<RefSpan>> {
    let mut lexer = Lexer::new(bytes);
    let mut found = Vec::new();
    // Last two tokens seen, oldest first
    let mut window: [Option<(Token, Range<usize>)>; 2] = [None, None];

    while let Some((token, span)) = lexer.next_spanned()? {
        if token == Token::Ref {
            if let [Some((Token::Int(n), first)), Some((Token::Int(g), _))] = &window {
                if let (Ok(obj_num), Ok(gen_num)) = (u32::try_from(*n), u16::try_from(*g)) {
                    found.push(RefSpan {
                        span: first.start..span.end,
                        target: ObjRef::new(obj_num, gen_num),
                    });
                }
            }
            window = [None, None];
            continue;
        }

        let [_, newest] = window;
        window = [newest, Some((token, span))];
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(bytes: &[u8]) -> Vec<u32> {
        reference_spans(bytes)
            .unwrap()
            .into_iter()
            .map(|r| r.target.obj_num)
            .collect()
    }

    #[test]
    fn test_finds_references() {
        assert_eq!(targets(b"<< /Kids [3 0 R 12 0 R] /Count 2 >>"), vec![3, 12]);
    }

    #[test]
    fn test_span_covers_triple() {
        let spans = reference_spans(b"<< /Parent 10 0 R >>").unwrap();
        assert_eq!(spans[0].span, 11..17);
    }

    #[test]
    fn test_ignores_bare_numbers() {
        assert_eq!(targets(b"[0 0 612 792]"), Vec::<u32>::new());
        assert_eq!(targets(b"[1 2 3 0 R]"), vec![3]);
    }

    #[test]
    fn test_ignores_string_content() {
        assert_eq!(targets(b"<< /T (see 4 0 R) /U <3420302052> >>"), Vec::<u32>::new());
    }

    #[test]
    fn test_negative_numbers_are_not_references() {
        assert_eq!(targets(b"[-1 0 R]"), Vec::<u32>::new());
    }
}
