//! Case-insensitive identifiers.
//!
//! A [`Symbol`] keeps the text it was created from for display, and compares,
//! hashes and orders by its uppercased form. Names made only of one to three
//! ASCII digits (`"1"`, `"42"`, `"007"`) and every symbol built from an
//! integer use a numeric representation that never allocates; these are the
//! positional keys of arrays and argument lists.
//!
//! Numeric and textual symbols with the same normalized text are equal and
//! hash identically, so `Symbol::new("1234") == Symbol::from_int(1234)` even
//! though only the right-hand side is numeric.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::FxHasher;

/// Longest all-digit name routed to the numeric representation.
const MAX_NUMERIC_DIGITS: usize = 3;

/// The value a symbol was created from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SymbolOrigin {
    Text,
    Int(i64),
    Float(f64),
}

struct TextSymbol {
    original: Box<str>,
    normalized: Box<str>,
    origin: SymbolOrigin,
}

#[derive(Clone)]
enum Repr {
    Int(i64),
    Text(Arc<TextSymbol>),
}

/// An immutable, case-insensitive identifier.
///
/// Equality, hashing and [`Ord`] use the normalized (uppercased) text only.
/// Use [`Symbol::eq_exact`] and [`Symbol::cmp_exact`] when the original case
/// matters.
#[derive(Clone)]
pub struct Symbol {
    repr: Repr,
    /// `FxHash` of the normalized text, computed once at construction.
    hash: u64,
}

impl Symbol {
    /// Create a symbol from a name.
    ///
    /// Never fails. Short all-digit names take the numeric fast path.
    pub fn new(text: impl AsRef<str>) -> Self {
        let text = text.as_ref();
        if let Some(value) = numeric_name(text) {
            return Self::from_int(value);
        }
        Self::from_text(text, SymbolOrigin::Text)
    }

    /// Create a numeric symbol.
    pub fn from_int(value: i64) -> Self {
        let hash = hash_normalized(Decimal::new(value).as_str());
        Symbol {
            repr: Repr::Int(value),
            hash,
        }
    }

    /// Create a symbol from a floating-point key.
    ///
    /// Integral values become numeric symbols; anything else keeps its
    /// decimal text and records the float as its origin.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "range is checked before the cast"
    )]
    pub fn from_float(value: f64) -> Self {
        #[expect(
            clippy::cast_precision_loss,
            reason = "bounds only need to be approximate"
        )]
        let in_range = value >= i64::MIN as f64 && value <= i64::MAX as f64;
        if value.is_finite() && value.fract() == 0.0 && in_range {
            return Self::from_int(value as i64);
        }
        Self::from_text(&value.to_string(), SymbolOrigin::Float(value))
    }

    fn from_text(text: &str, origin: SymbolOrigin) -> Self {
        let normalized: Box<str> = if text.is_ascii() {
            text.to_ascii_uppercase().into_boxed_str()
        } else {
            text.to_uppercase().into_boxed_str()
        };
        let hash = hash_normalized(&normalized);
        Symbol {
            repr: Repr::Text(Arc::new(TextSymbol {
                original: text.into(),
                normalized,
                origin,
            })),
            hash,
        }
    }

    /// Whether this symbol uses the numeric representation.
    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self.repr, Repr::Int(_))
    }

    /// The integer behind a numeric symbol.
    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self.repr {
            Repr::Int(value) => Some(value),
            Repr::Text(_) => None,
        }
    }

    /// The value this symbol was created from.
    pub fn origin(&self) -> SymbolOrigin {
        match &self.repr {
            Repr::Int(value) => SymbolOrigin::Int(*value),
            Repr::Text(text) => text.origin,
        }
    }

    /// The text as written.
    pub fn original(&self) -> Cow<'_, str> {
        match &self.repr {
            Repr::Int(value) => Cow::Owned(Decimal::new(*value).as_str().to_owned()),
            Repr::Text(text) => Cow::Borrowed(&text.original),
        }
    }

    /// The uppercased text used for comparison.
    pub fn normalized(&self) -> Cow<'_, str> {
        match &self.repr {
            Repr::Int(value) => Cow::Owned(Decimal::new(*value).as_str().to_owned()),
            Repr::Text(text) => Cow::Borrowed(&text.normalized),
        }
    }

    /// Case-sensitive equality on the original text.
    pub fn eq_exact(&self, other: &Symbol) -> bool {
        self.with_original(|a| other.with_original(|b| a == b))
    }

    /// Case-sensitive ordering on the original text.
    pub fn cmp_exact(&self, other: &Symbol) -> Ordering {
        self.with_original(|a| other.with_original(|b| a.cmp(b)))
    }

    /// Case-insensitive equality against a plain string.
    pub fn matches(&self, text: &str) -> bool {
        self.with_normalized(|normalized| {
            if text.is_ascii() {
                normalized.eq_ignore_ascii_case(text)
            } else {
                normalized == text.to_uppercase()
            }
        })
    }

    fn with_original<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        match &self.repr {
            Repr::Int(value) => f(Decimal::new(*value).as_str()),
            Repr::Text(text) => f(&text.original),
        }
    }

    fn with_normalized<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        match &self.repr {
            Repr::Int(value) => f(Decimal::new(*value).as_str()),
            Repr::Text(text) => f(&text.normalized),
        }
    }
}

/// Parse a name eligible for the numeric fast path.
fn numeric_name(text: &str) -> Option<i64> {
    if text.is_empty()
        || text.len() > MAX_NUMERIC_DIGITS
        || !text.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    text.parse().ok()
}

fn hash_normalized(normalized: &str) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(normalized.as_bytes());
    hasher.finish()
}

/// Decimal rendering of an `i64` on the stack.
struct Decimal {
    buf: [u8; 20],
    start: usize,
}

impl Decimal {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "a single decimal digit fits in u8"
    )]
    fn new(value: i64) -> Self {
        let mut buf = [0u8; 20];
        let mut start = buf.len();
        let mut rest = value.unsigned_abs();
        loop {
            start -= 1;
            buf[start] = b'0' + (rest % 10) as u8;
            rest /= 10;
            if rest == 0 {
                break;
            }
        }
        if value < 0 {
            start -= 1;
            buf[start] = b'-';
        }
        Decimal { buf, start }
    }

    fn as_str(&self) -> &str {
        // Only ASCII digits and '-' are ever written.
        std::str::from_utf8(&self.buf[self.start..]).unwrap_or_default()
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        if self.hash != other.hash {
            return false;
        }
        match (&self.repr, &other.repr) {
            (Repr::Int(a), Repr::Int(b)) => a == b,
            (Repr::Text(a), Repr::Text(b)) => Arc::ptr_eq(a, b) || a.normalized == b.normalized,
            (Repr::Int(value), Repr::Text(text)) | (Repr::Text(text), Repr::Int(value)) => {
                &*text.normalized == Decimal::new(*value).as_str()
            }
        }
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> Ordering {
        if let (Repr::Int(a), Repr::Int(b)) = (&self.repr, &other.repr) {
            if a == b {
                return Ordering::Equal;
            }
        }
        self.with_normalized(|a| other.with_normalized(|b| a.cmp(b)))
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_original(|text| f.write_str(text))
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Int(value) => write!(f, "Symbol({value})"),
            Repr::Text(text) => write!(f, "Symbol({:?})", &*text.original),
        }
    }
}

impl From<&str> for Symbol {
    fn from(text: &str) -> Self {
        Symbol::new(text)
    }
}

impl From<String> for Symbol {
    fn from(text: String) -> Self {
        Symbol::new(text)
    }
}

impl From<&String> for Symbol {
    fn from(text: &String) -> Self {
        Symbol::new(text)
    }
}

impl From<i64> for Symbol {
    fn from(value: i64) -> Self {
        Symbol::from_int(value)
    }
}

impl From<&Symbol> for Symbol {
    fn from(symbol: &Symbol) -> Self {
        symbol.clone()
    }
}
